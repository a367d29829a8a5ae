use std::sync::Arc;

use spark_controller::{CompileError, ControllerCompiler, IdentityCache, SchemaError, TypeRegistry};
use thiserror::Error;

use crate::{
    application::Application,
    config::{ApplicationConfig, FailurePolicy},
    session::{SessionError, SessionFactory, SessionStrategy},
    table::{ControllerTable, RouteConflict},
};

/// 构建应用失败。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApplicationBuildError {
    /// 类型描述注册失败。
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// `abort` 策略下某个控制器编译失败。
    #[error("controller compilation aborted application load: {0}")]
    Compile(#[from] CompileError),
    /// 两个控制器声明了相同的路由路径。
    #[error(transparent)]
    Route(#[from] RouteConflict),
    /// 会话策略无法满足。
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// `ApplicationBuilder` 聚合类型描述、装载配置与会话工厂，产出可调度的 [`Application`]。
///
/// # 教案级注释
/// - **设计目标 (Why)**
///   - 为宿主提供唯一的装载入口：发现全部控制器、逐个编译、按失败策略处理错误、登记路由、启动会话工厂；
/// - **关键流程 (How)**
///   1. `configure_registry`：向 [`TypeRegistry`] 注册类型描述（代码构造或模式文件加载）；
///   2. `with_config` / `with_stateful_sessions`：设置装载配置与有状态会话工厂；
///   3. `build`：按注册表顺序编译全部携带控制器标记的类型，共享同一个身份缓存；
/// - **契约说明 (What)**
///   - 配置步骤返回 `&mut Self`，`build` 消费 Builder；
///   - `abort` 策略下首个编译错误即返回 [`ApplicationBuildError::Compile`]；
///     `skip` 策略下以 `warn` 级别记录并跳过，错误保留在 [`Application::skipped`]；
///   - 路由冲突与会话配置错误与失败策略无关，总是中止装载。
/// - **风险提示 (Trade-offs)**
///   - 编译在调用线程上顺序执行；控制器数量极大时装载时间与之线性相关。
#[derive(Debug, Default)]
pub struct ApplicationBuilder {
    registry: TypeRegistry,
    config: ApplicationConfig,
    stateful: Option<Arc<dyn SessionFactory>>,
    cache: Option<Arc<IdentityCache>>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以既有注册表为起点。
    pub fn from_registry(registry: TypeRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// 配置类型注册表。
    ///
    /// - **执行逻辑 (How)**：立即执行闭包，若返回错误则中止后续链式调用；
    /// - **前置条件**：闭包需保持幂等性，重复注册同名类型会失败。
    pub fn configure_registry<F>(&mut self, configure: F) -> Result<&mut Self, ApplicationBuildError>
    where
        F: FnOnce(&mut TypeRegistry) -> Result<(), SchemaError>,
    {
        configure(&mut self.registry)?;
        Ok(self)
    }

    pub fn with_config(&mut self, config: ApplicationConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// 提供有状态会话工厂；配置策略为 `stateful` 时必须调用。
    pub fn with_stateful_sessions(&mut self, factory: Arc<dyn SessionFactory>) -> &mut Self {
        self.stateful = Some(factory);
        self
    }

    /// 与其他组件共享身份缓存。
    pub fn with_identity_cache(&mut self, cache: Arc<IdentityCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    /// 最终构建应用。
    pub fn build(self) -> Result<Application, ApplicationBuildError> {
        let ApplicationBuilder {
            registry,
            config,
            stateful,
            cache,
        } = self;
        let sessions = SessionStrategy::from_config(&config.session, stateful)?;
        let cache = cache.unwrap_or_default();

        let mut controllers = ControllerTable::new();
        let mut skipped = Vec::new();
        for decl in registry.controllers() {
            let compiled = ControllerCompiler::new(&registry, decl.name.as_str())
                .with_cache(Arc::clone(&cache))
                .compile();
            match compiled {
                Ok(descriptor) => {
                    let descriptor = controllers.insert(descriptor)?;
                    tracing::debug!(
                        controller = %descriptor.name(),
                        route = descriptor.url(),
                        session = %descriptor.session_policy(),
                        "controller mounted"
                    );
                }
                Err(error) => match config.compile.on_error {
                    FailurePolicy::Abort => return Err(error.into()),
                    FailurePolicy::Skip => {
                        tracing::warn!(
                            controller = error.subject(),
                            code = error.code(),
                            error = %error,
                            "controller skipped"
                        );
                        skipped.push(error);
                    }
                },
            }
        }

        sessions.start(&config.session)?;
        tracing::info!(
            controllers = controllers.len(),
            skipped = skipped.len(),
            session = %sessions.configured_policy(),
            "application loaded"
        );
        Ok(Application::new(config, controllers, sessions, skipped))
    }
}

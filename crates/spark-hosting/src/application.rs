use std::sync::Arc;

use spark_controller::{ActionBinding, CompileError, ControllerDescriptor, InterceptorRef};
use thiserror::Error;

use crate::{
    config::ApplicationConfig,
    session::{Session, SessionFactory, SessionRequest, SessionStrategy},
    table::ControllerTable,
};

/// 调度查找失败。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no controller is mounted at `{route}`")]
    UnknownRoute { route: String },
    #[error("controller at `{route}` has no action `{action}`")]
    UnknownAction { route: String, action: String },
}

/// 一次成功的调度查找：描述符与 Action 绑定。
#[derive(Clone, Copy, Debug)]
pub struct ResolvedAction<'a> {
    descriptor: &'a Arc<ControllerDescriptor>,
    action: &'a ActionBinding,
}

impl<'a> ResolvedAction<'a> {
    pub fn descriptor(&self) -> &'a Arc<ControllerDescriptor> {
        self.descriptor
    }

    pub fn action(&self) -> &'a ActionBinding {
        self.action
    }

    /// 调用处理方法之前按顺序执行的拦截器。
    pub fn interceptors(&self) -> &'a [InterceptorRef] {
        self.action.interceptors()
    }

    pub fn content_type(&self) -> &'a str {
        self.action.content_type()
    }
}

/// 装载完成的应用。
///
/// # 教案级注释
/// - **设计目的 (Why)**
///   - 将控制器目录、会话策略与装载配置集中保存，调度器只需持有一个入口；
///   - 保留被跳过的控制器错误，方便健康检查与启动日志给出完整诊断；
/// - **体系位置 (Where)**
///   - 由 [`ApplicationBuilder`](crate::builder::ApplicationBuilder) 生成；
/// - **契约说明 (What)**
///   - 结构体在构建后只读，可放入 `Arc` 跨线程共享；
///   - [`shutdown`](Self::shutdown) 停止全部会话工厂，调用后不应再调度请求。
#[derive(Debug)]
pub struct Application {
    config: ApplicationConfig,
    controllers: ControllerTable,
    sessions: SessionStrategy,
    skipped: Vec<CompileError>,
}

impl Application {
    pub(crate) fn new(
        config: ApplicationConfig,
        controllers: ControllerTable,
        sessions: SessionStrategy,
        skipped: Vec<CompileError>,
    ) -> Self {
        Self {
            config,
            controllers,
            sessions,
            skipped,
        }
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    pub fn controllers(&self) -> &ControllerTable {
        &self.controllers
    }

    /// 在 `skip` 策略下被跳过的控制器及其失败原因。
    pub fn skipped(&self) -> &[CompileError] {
        &self.skipped
    }

    pub fn sessions(&self) -> &SessionStrategy {
        &self.sessions
    }

    /// 按路由路径与 Action 名称查找处理目标。
    pub fn resolve(&self, route: &str, action: &str) -> Result<ResolvedAction<'_>, DispatchError> {
        let descriptor = self
            .controllers
            .get(route)
            .ok_or_else(|| DispatchError::UnknownRoute {
                route: route.to_owned(),
            })?;
        let binding = descriptor
            .action(action)
            .ok_or_else(|| DispatchError::UnknownAction {
                route: route.to_owned(),
                action: action.to_owned(),
            })?;
        Ok(ResolvedAction {
            descriptor,
            action: binding,
        })
    }

    /// 为控制器选出会话工厂。
    pub fn session_factory_for(&self, descriptor: &ControllerDescriptor) -> Option<Arc<dyn SessionFactory>> {
        self.sessions.factory_for(descriptor.session_policy())
    }

    /// 为一次请求取得会话；控制器不使用会话时返回 `None`。
    pub fn session_for(
        &self,
        descriptor: &ControllerDescriptor,
        request: &SessionRequest<'_>,
    ) -> Option<Arc<dyn Session>> {
        self.session_factory_for(descriptor)
            .map(|factory| factory.find(request))
    }

    /// 作废控制器所用工厂中的某个会话；控制器不使用会话或会话不存在时返回 `false`。
    pub fn invalidate_session(&self, descriptor: &ControllerDescriptor, session_id: &str) -> bool {
        self.session_factory_for(descriptor)
            .is_some_and(|factory| factory.invalidate(session_id))
    }

    pub fn shutdown(&self) {
        self.sessions.stop();
        tracing::info!(controllers = self.controllers.len(), "application stopped");
    }
}

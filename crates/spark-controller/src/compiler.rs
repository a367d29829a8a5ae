//! # ControllerCompiler：编译流程编排
//!
//! ## 核心意图（Why）
//! - 把“加载 → 上下文 → 参数 → Action”四步串成一次性流程，并以显式状态机记录进度，
//!   让失败可以精确归因到阶段；
//! - 编译在应用装载期执行一次，结果交给调度器长期复用。
//!
//! ## 行为契约（What）
//! - [`ControllerCompiler::compile`] 按值消费编译器：同一实例不可能被编译两次；
//! - 任一阶段失败立即返回 [`CompileError`]，其 `stage` 为失败前最后到达的状态，不产出部分描述符；
//! - 编译器只借用注册表，返回后不保留对描述符的任何引用。

use std::sync::Arc;

use crate::{
    action::bind_actions,
    context::bind_contexts,
    descriptor::ControllerDescriptor,
    error::{CompileError, CompileErrorKind, Result},
    loader::{IdentityCache, TypeLoader},
    model::registry::TypeRegistry,
    parameter::bind_parameters,
};

/// 编译状态机。
///
/// ```text
/// Uninitialized → Loading → ContextBound → ParameterBound → ActionBound → Compiled
///        └──────────┴────────────┴──────────────┴───────────────┴──────→ Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilerState {
    Uninitialized,
    Loading,
    ContextBound,
    ParameterBound,
    ActionBound,
    Compiled,
    Failed,
}

impl CompilerState {
    /// 判断状态跃迁是否合法。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：编排逻辑在每一步前校验，保证实现与状态图一致；
    /// - **契约 (What)**：只允许沿主链前进一步，或从任一非终止态进入 `Failed`；
    /// - **执行 (How)**：匹配元组 `(self, target)`。
    pub fn can_transition_to(self, target: CompilerState) -> bool {
        matches!(
            (self, target),
            (CompilerState::Uninitialized, CompilerState::Loading)
                | (CompilerState::Loading, CompilerState::ContextBound)
                | (CompilerState::ContextBound, CompilerState::ParameterBound)
                | (CompilerState::ParameterBound, CompilerState::ActionBound)
                | (CompilerState::ActionBound, CompilerState::Compiled)
                | (CompilerState::Uninitialized, CompilerState::Failed)
                | (CompilerState::Loading, CompilerState::Failed)
                | (CompilerState::ContextBound, CompilerState::Failed)
                | (CompilerState::ParameterBound, CompilerState::Failed)
                | (CompilerState::ActionBound, CompilerState::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompilerState::Uninitialized => "uninitialized",
            CompilerState::Loading => "loading",
            CompilerState::ContextBound => "context_bound",
            CompilerState::ParameterBound => "parameter_bound",
            CompilerState::ActionBound => "action_bound",
            CompilerState::Compiled => "compiled",
            CompilerState::Failed => "failed",
        }
    }
}

impl core::fmt::Display for CompilerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个主体类型的一次性编译器。
///
/// # 教案式说明
/// - **意图 (Why)**：以所有权表达“每个类型只编译一次”，调用方无需担心重复调用的未定义行为；
/// - **契约 (What)**：
///   - `registry`：只读借用的类型描述全集；
///   - `subject`：主体类型的全限定名，可以为空（将得到 `InvalidSubject`）；
///   - `cache`：身份缓存，默认私有，可通过 [`with_cache`](Self::with_cache) 与其他编译器共享；
/// - **风险 (Trade-offs)**：编译器本身不是 `Clone`，批量编译时每个主体各建一个实例，开销只是一次借用与一个 `Arc`。
#[derive(Debug)]
pub struct ControllerCompiler<'r> {
    registry: &'r TypeRegistry,
    subject: String,
    cache: Arc<IdentityCache>,
    state: CompilerState,
}

impl<'r> ControllerCompiler<'r> {
    pub fn new(registry: &'r TypeRegistry, subject: impl Into<String>) -> Self {
        Self {
            registry,
            subject: subject.into(),
            cache: Arc::default(),
            state: CompilerState::Uninitialized,
        }
    }

    /// 使用共享的身份缓存。
    pub fn with_cache(mut self, cache: Arc<IdentityCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn state(&self) -> CompilerState {
        self.state
    }

    /// 执行完整编译。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：
    ///   1. `Loading`：解析主体身份并确认控制器标记；
    ///   2. `ContextBound`：上下文槽位；
    ///   3. `ParameterBound`：可绑定参数、访问器/修改器、转换器；
    ///   4. `ActionBound`：Action 表与拦截器链；
    ///   5. 组装描述符并进入 `Compiled`；
    /// - **契约 (What)**：失败时状态进入 `Failed`，错误携带失败前的阶段。
    pub fn compile(mut self) -> Result<ControllerDescriptor> {
        let _span = tracing::debug_span!("compile_controller", subject = %self.subject).entered();
        match self.run() {
            Ok(descriptor) => {
                tracing::debug!(
                    subject = %self.subject,
                    actions = descriptor.actions().len(),
                    parameters = descriptor.parameters().len(),
                    "controller compiled"
                );
                Ok(descriptor)
            }
            Err(error) => {
                let error = error.at(self.state);
                self.advance(CompilerState::Failed);
                tracing::debug!(subject = %self.subject, code = error.code(), "controller compilation failed");
                Err(error)
            }
        }
    }

    fn run(&mut self) -> Result<ControllerDescriptor> {
        self.advance(CompilerState::Loading);
        let loaded = TypeLoader::new(self.registry, Arc::clone(&self.cache)).load(&self.subject)?;
        let subject = loaded.decl;
        let Some(marker) = &subject.controller else {
            return Err(CompileError::new(
                CompileErrorKind::MissingContract,
                subject.name.as_str(),
                "controller marker not declared",
            ));
        };

        let contexts = bind_contexts(subject);
        self.advance(CompilerState::ContextBound);

        let table = bind_parameters(self.registry, subject)?;
        self.advance(CompilerState::ParameterBound);

        let actions = bind_actions(self.registry, subject)?;
        self.advance(CompilerState::ActionBound);

        let descriptor = ControllerDescriptor::new(
            loaded.identity,
            marker.url.clone(),
            marker.session,
            contexts,
            table.parameters,
            table.converters,
            actions,
        );
        self.advance(CompilerState::Compiled);
        Ok(descriptor)
    }

    fn advance(&mut self, next: CompilerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal compiler transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(subject = %self.subject, from = %self.state, to = %next, "compiler state transition");
        self.state = next;
    }
}

//! # ControllerDescriptor：编译产物
//!
//! ## 核心意图（Why）
//! - 调度器依据描述符按名称查找 Action、按声明顺序执行拦截器链、为参数字段调用访问器/修改器，
//!   而不必在每个请求上重新检视控制器类型；
//! - 描述符在应用装载期构建一次，此后被任意多个请求处理线程并发只读访问。
//!
//! ## 行为契约（What）
//! - 所有字段私有且不提供任何修改入口；编译器返回后不保留对描述符的引用；
//! - 结构体只包含拥有所有权的数据，因而自动满足 `Send + Sync`，推荐以 `Arc<ControllerDescriptor>` 发布；
//! - 实现 `Serialize`，可供代码生成阶段导出直接调用桩所需的符号表。

use core::{fmt, str::FromStr};
use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    action::ActionBinding,
    context::{ContextBindings, ContextKind},
    loader::SubjectIdentity,
    model::{TypeName, TypeRef},
    parameter::ParameterBinding,
};

/// 控制器声明的会话策略。
///
/// - `None`：控制器不使用会话；
/// - `Stateless`：所有请求共享同一个只读的无状态会话；
/// - `Stateful`：由会话存储子系统为每个客户端维护独立会话（默认）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    None,
    Stateless,
    #[default]
    Stateful,
}

impl SessionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPolicy::None => "none",
            SessionPolicy::Stateless => "stateless",
            SessionPolicy::Stateful => "stateful",
        }
    }
}

impl fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未识别的会话策略文本。
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown session policy `{0}`, expected one of none|stateless|stateful")]
pub struct UnknownSessionPolicy(pub String);

impl FromStr for SessionPolicy {
    type Err = UnknownSessionPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SessionPolicy::None),
            "stateless" => Ok(SessionPolicy::Stateless),
            "stateful" => Ok(SessionPolicy::Stateful),
            other => Err(UnknownSessionPolicy(other.to_owned())),
        }
    }
}

/// 已解析方法的身份：所属类型、名称与完整签名。
///
/// 修改器可能继承自父类，因此 `owner` 不一定等于主体类型。
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodRef {
    owner: TypeName,
    name: String,
    params: Vec<TypeRef>,
    returns: Option<TypeRef>,
}

impl MethodRef {
    pub(crate) fn new(
        owner: TypeName,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        returns: Option<TypeRef>,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            params,
            returns,
        }
    }

    pub fn owner(&self) -> &TypeName {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn returns(&self) -> Option<&TypeRef> {
        self.returns.as_ref()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.owner, self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        if let Some(returns) = &self.returns {
            write!(f, " -> {returns}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({self})")
    }
}

/// 单个控制器类型的编译产物。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合四个编译阶段的结果，作为调度器与代码生成器之间的唯一契约；
/// - **契约 (What)**：
///   - `actions`：Action 名称 → [`ActionBinding`]；
///   - `parameters`：字段名 → [`ParameterBinding`]；
///   - `converters`：字段名 → 转换器类型，键集合是 `parameters` 的子集；
///   - `contexts`：每类上下文至多一个字段名；
///   - `url` 与 `session`：来自控制器标记；
/// - **风险 (Trade-offs)**：映射使用 `BTreeMap`，遍历顺序按名称排序而非声明顺序；调度只按名称查找，不依赖顺序。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ControllerDescriptor {
    identity: Arc<SubjectIdentity>,
    url: String,
    session: SessionPolicy,
    actions: BTreeMap<String, ActionBinding>,
    parameters: BTreeMap<String, ParameterBinding>,
    converters: BTreeMap<String, TypeName>,
    contexts: ContextBindings,
}

impl ControllerDescriptor {
    pub(crate) fn new(
        identity: Arc<SubjectIdentity>,
        url: String,
        session: SessionPolicy,
        contexts: ContextBindings,
        parameters: BTreeMap<String, ParameterBinding>,
        converters: BTreeMap<String, TypeName>,
        actions: BTreeMap<String, ActionBinding>,
    ) -> Self {
        Self {
            identity,
            url,
            session,
            actions,
            parameters,
            converters,
            contexts,
        }
    }

    pub fn identity(&self) -> &SubjectIdentity {
        &self.identity
    }

    /// 主体类型全限定名。
    pub fn name(&self) -> &TypeName {
        self.identity.name()
    }

    /// 控制器标记声明的路由路径。
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session_policy(&self) -> SessionPolicy {
        self.session
    }

    pub fn actions(&self) -> &BTreeMap<String, ActionBinding> {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&ActionBinding> {
        self.actions.get(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParameterBinding> {
        &self.parameters
    }

    pub fn parameter(&self, field: &str) -> Option<&ParameterBinding> {
        self.parameters.get(field)
    }

    pub fn converters(&self) -> &BTreeMap<String, TypeName> {
        &self.converters
    }

    pub fn converter(&self, field: &str) -> Option<&TypeName> {
        self.converters.get(field)
    }

    pub fn contexts(&self) -> &ContextBindings {
        &self.contexts
    }

    pub fn context(&self, kind: ContextKind) -> Option<&str> {
        self.contexts.get(kind)
    }
}

//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 控制器契约的所有失败都发生在编译期，且都是结构性的：缺少标记、签名不符、访问器缺失等；
//! - 统一以单一错误类型 [`CompileError`] 报告，携带主体类型名、成员名、可读原因与失败时所处的编译状态，
//!   便于应用装配层决定“整体中止”还是“跳过并告警”。
//!
//! ## 设计要求（What）
//! - [`CompileErrorKind`] 枚举覆盖完整的失败分类，每个分类拥有稳定的点分错误码；
//! - 任何失败都立即终止对应主体的编译，不产出部分描述符；
//! - 模式文件加载错误单独建模为 [`SchemaError`]，与编译错误互不混淆。

use core::fmt;

use thiserror::Error;

use crate::compiler::CompilerState;

/// 编译失败分类。
///
/// # 教案式说明
/// - **意图 (Why)**：为调用方提供可匹配的失败语义，避免解析错误文本；
/// - **契约 (What)**：`Display` 输出简短英文标签，[`code`](Self::code) 输出稳定错误码；
/// - **风险 (Trade-offs)**：新增分类属于破坏性变更，因此标注 `#[non_exhaustive]`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum CompileErrorKind {
    /// 未提供主体类型，或主体名称不在类型注册表中。
    #[error("invalid subject")]
    InvalidSubject,
    /// 主体缺少顶层控制器标记。
    #[error("missing controller contract")]
    MissingContract,
    /// 可绑定参数声明为原始值类型。
    #[error("invalid parameter type")]
    InvalidParameterType,
    /// 声明的转换器不具备转换器能力。
    #[error("invalid converter")]
    InvalidConverter,
    /// 缺少 `get` 访问器。
    #[error("missing accessor")]
    MissingAccessor,
    /// 缺少 `set` 修改器。
    #[error("missing mutator")]
    MissingMutator,
    /// 拦截器链中出现未携带拦截器标记的类型。
    #[error("illegal interceptor")]
    IllegalInterceptor,
    /// Action 方法签名不符合约定。
    #[error("invalid action signature")]
    InvalidActionSignature,
}

impl CompileErrorKind {
    /// 稳定错误码，供日志与告警聚合使用。
    pub fn code(self) -> &'static str {
        match self {
            CompileErrorKind::InvalidSubject => "controller.subject.invalid",
            CompileErrorKind::MissingContract => "controller.subject.contract_missing",
            CompileErrorKind::InvalidParameterType => "controller.parameter.primitive",
            CompileErrorKind::InvalidConverter => "controller.parameter.converter",
            CompileErrorKind::MissingAccessor => "controller.parameter.accessor_missing",
            CompileErrorKind::MissingMutator => "controller.parameter.mutator_missing",
            CompileErrorKind::IllegalInterceptor => "controller.action.interceptor",
            CompileErrorKind::InvalidActionSignature => "controller.action.signature",
        }
    }
}

/// 控制器编译错误。
///
/// # 教案式说明
/// - **意图 (Why)**：把“哪个类型、哪个成员、为什么、在哪个阶段”一次性交给调用方；
/// - **契约 (What)**：
///   - `subject`：主体类型全限定名（主体缺失时为调用方传入的原始名称，可能为空）；
///   - `member`：出错成员名，例如 `setAge` 或 `view`；类型级错误为 `None`；
///   - `reason`：人类可读的原因，访问器/修改器缺失时包含期望的完整签名；
///   - `stage`：失败前最后到达的编译状态；
/// - **执行逻辑 (How)**：各编译阶段以 [`CompileError::new`] 构造错误，编译器在传播时用
///   [`CompileError::at`] 补齐状态。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} in `{subject}`{}: {reason}", MemberSuffix(.member.as_deref()))]
pub struct CompileError {
    kind: CompileErrorKind,
    subject: String,
    member: Option<String>,
    reason: String,
    stage: CompilerState,
}

impl CompileError {
    pub(crate) fn new(
        kind: CompileErrorKind,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            member: None,
            reason: reason.into(),
            stage: CompilerState::Uninitialized,
        }
    }

    pub(crate) fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub(crate) fn at(mut self, stage: CompilerState) -> Self {
        self.stage = stage;
        self
    }

    pub fn kind(&self) -> CompileErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// 失败前最后到达的编译状态。
    pub fn stage(&self) -> CompilerState {
        self.stage
    }
}

struct MemberSuffix<'a>(Option<&'a str>);

impl fmt::Display for MemberSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(member) => write!(f, " (member `{member}`)"),
            None => Ok(()),
        }
    }
}

/// 类型描述加载错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// TOML 模式文件解析失败。
    #[error("failed to parse TOML type schema: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON 模式文件解析失败。
    #[cfg(feature = "schema-json")]
    #[error("failed to parse JSON type schema: {0}")]
    Json(#[from] serde_json::Error),
    /// 同名类型重复注册。
    #[error("type `{name}` is already registered")]
    DuplicateType { name: String },
    /// 类型名称为空。
    #[error("type name must not be empty")]
    EmptyTypeName,
}

/// crate 内部统一的编译结果别名。
pub type Result<T, E = CompileError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_member_when_present() {
        let error = CompileError::new(
            CompileErrorKind::MissingMutator,
            "app.UserController",
            "expected `setAge(spark.lang.String)`",
        )
        .with_member("setAge");
        assert_eq!(
            error.to_string(),
            "missing mutator in `app.UserController` (member `setAge`): expected `setAge(spark.lang.String)`"
        );

        let error = CompileError::new(
            CompileErrorKind::MissingContract,
            "app.Plain",
            "controller marker not declared",
        );
        assert_eq!(
            error.to_string(),
            "missing controller contract in `app.Plain`: controller marker not declared"
        );
        assert_eq!(error.member(), None);
    }

    #[test]
    fn codes_are_unique() {
        let kinds = [
            CompileErrorKind::InvalidSubject,
            CompileErrorKind::MissingContract,
            CompileErrorKind::InvalidParameterType,
            CompileErrorKind::InvalidConverter,
            CompileErrorKind::MissingAccessor,
            CompileErrorKind::MissingMutator,
            CompileErrorKind::IllegalInterceptor,
            CompileErrorKind::InvalidActionSignature,
        ];
        let codes: std::collections::BTreeSet<_> = kinds.iter().map(|kind| kind.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }
}

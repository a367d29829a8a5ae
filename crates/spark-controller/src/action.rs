//! # Action 绑定阶段
//!
//! 扫描携带 Action 标记的方法：记录内容类型、解析拦截器链、校验处理方法签名。
//!
//! - 拦截器链先于签名校验：同时存在两类问题时报告拦截器错误；
//! - 根类型占位符在链中被静默剔除，其余条目必须携带拦截器标记，顺序与重复项原样保留；
//! - 合法签名只有一种：零参数且返回 `spark.api.Result`；
//! - 同名 Action 后者覆盖前者（方法重载在此表中不可区分）。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    descriptor::MethodRef,
    error::{CompileError, CompileErrorKind, Result},
    model::{ActionMarker, MethodDecl, TypeDecl, TypeName, known, registry::TypeRegistry},
};

/// 已校验的拦截器类型引用。
///
/// 只能由 Action 阶段构造，持有即意味着该类型在注册表中携带拦截器标记。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InterceptorRef(TypeName);

impl InterceptorRef {
    pub fn name(&self) -> &TypeName {
        &self.0
    }
}

/// 单个 Action 的编译结果。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionBinding {
    handler: MethodRef,
    content_type: String,
    interceptors: Vec<InterceptorRef>,
}

impl ActionBinding {
    pub fn handler(&self) -> &MethodRef {
        &self.handler
    }

    /// 响应内容类型标签，原样取自标记。
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// 按声明顺序排列的拦截器链，可能为空。
    pub fn interceptors(&self) -> &[InterceptorRef] {
        &self.interceptors
    }
}

/// 执行 Action 绑定阶段。
pub(crate) fn bind_actions(
    registry: &TypeRegistry,
    subject: &TypeDecl,
) -> Result<BTreeMap<String, ActionBinding>> {
    let mut actions = BTreeMap::new();
    for method in &subject.methods {
        let Some(marker) = &method.action else {
            continue;
        };
        let interceptors = resolve_chain(registry, subject, method, marker)?;
        check_signature(subject, method)?;

        let binding = ActionBinding {
            handler: MethodRef::new(
                subject.name.clone(),
                method.name.as_str(),
                method.params.clone(),
                method.returns.clone(),
            ),
            content_type: marker.content_type.clone(),
            interceptors,
        };
        tracing::trace!(
            subject = %subject.name,
            action = %method.name,
            content_type = %binding.content_type,
            chain = binding.interceptors.len(),
            "action bound"
        );
        if actions.insert(method.name.clone(), binding).is_some() {
            tracing::debug!(subject = %subject.name, action = %method.name, "action declared twice; later method wins");
        }
    }
    Ok(actions)
}

fn resolve_chain(
    registry: &TypeRegistry,
    subject: &TypeDecl,
    method: &MethodDecl,
    marker: &ActionMarker,
) -> Result<Vec<InterceptorRef>> {
    let mut chain = Vec::with_capacity(marker.intercepted_by.len());
    for interceptor in &marker.intercepted_by {
        if interceptor.is(known::OBJECT) {
            continue;
        }
        if !registry.is_interceptor(interceptor.as_str()) {
            return Err(CompileError::new(
                CompileErrorKind::IllegalInterceptor,
                subject.name.as_str(),
                format!(
                    "`{interceptor}` declared on action `{}` does not carry the interceptor marker",
                    method.name
                ),
            )
            .with_member(method.name.as_str()));
        }
        chain.push(InterceptorRef(interceptor.clone()));
    }
    Ok(chain)
}

fn check_signature(subject: &TypeDecl, method: &MethodDecl) -> Result<()> {
    let returns_result = method
        .returns
        .as_ref()
        .is_some_and(|returns| returns.is(known::RESULT));
    if returns_result && method.params.is_empty() {
        return Ok(());
    }
    let found = MethodRef::new(
        subject.name.clone(),
        method.name.as_str(),
        method.params.clone(),
        method.returns.clone(),
    );
    Err(CompileError::new(
        CompileErrorKind::InvalidActionSignature,
        subject.name.as_str(),
        format!(
            "action must be declared as `{}() -> {}`, found `{found}`",
            method.name,
            known::RESULT
        ),
    )
    .with_member(method.name.as_str()))
}

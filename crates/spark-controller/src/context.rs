//! # 上下文绑定阶段
//!
//! 扫描主体直接声明的全部字段，把声明类型精确等于六类上下文类型之一的字段名记录到对应槽位。
//! 该阶段不依赖任何标记，也没有失败路径：未出现的上下文只是保持空槽。
//!
//! 同一类上下文出现多个字段时，按枚举顺序后者覆盖前者；这一行为为兼容既有控制器而保留，
//! 覆盖发生时仅输出调试日志。

use core::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::model::{FieldRole, TypeDecl, TypeRef, known};

/// 可注入控制器实例的上下文类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Application,
    Cookie,
    Error,
    Message,
    Request,
    Session,
}

impl ContextKind {
    pub const ALL: [ContextKind; 6] = [
        ContextKind::Application,
        ContextKind::Cookie,
        ContextKind::Error,
        ContextKind::Message,
        ContextKind::Request,
        ContextKind::Session,
    ];

    /// 该类别对应的内建类型名。
    pub fn type_name(self) -> &'static str {
        match self {
            ContextKind::Application => known::APPLICATION_CONTEXT,
            ContextKind::Cookie => known::COOKIE_CONTEXT,
            ContextKind::Error => known::ERROR_CONTEXT,
            ContextKind::Message => known::MESSAGE_CONTEXT,
            ContextKind::Request => known::REQUEST_CONTEXT,
            ContextKind::Session => known::SESSION_CONTEXT,
        }
    }

    /// 按声明类型精确匹配上下文类别；子类型或原始类型都不匹配。
    pub fn from_type(ty: &TypeRef) -> Option<Self> {
        let name = ty.as_named()?;
        Self::ALL
            .into_iter()
            .find(|kind| name.is(kind.type_name()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Application => "application",
            ContextKind::Cookie => "cookie",
            ContextKind::Error => "error",
            ContextKind::Message => "message",
            ContextKind::Request => "request",
            ContextKind::Session => "session",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每类上下文至多一个字段名的绑定表。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextBindings {
    slots: [Option<String>; 6],
}

impl ContextBindings {
    /// 读取某类上下文绑定的字段名。
    pub fn get(&self, kind: ContextKind) -> Option<&str> {
        self.slots[kind.slot()].as_deref()
    }

    /// 按类别顺序遍历已绑定的槽位。
    pub fn iter(&self) -> impl Iterator<Item = (ContextKind, &str)> {
        ContextKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|field| (kind, field)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// 写入槽位并返回被覆盖的旧字段名。
    fn bind(&mut self, kind: ContextKind, field: &str) -> Option<String> {
        self.slots[kind.slot()].replace(field.to_owned())
    }
}

impl Serialize for ContextBindings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (kind, field) in self.iter() {
            map.serialize_entry(kind.as_str(), field)?;
        }
        map.end()
    }
}

/// 执行上下文绑定阶段。
pub(crate) fn bind_contexts(subject: &TypeDecl) -> ContextBindings {
    let mut bindings = ContextBindings::default();
    for field in &subject.fields {
        let FieldRole::Context(kind) = field.role() else {
            continue;
        };
        if let Some(previous) = bindings.bind(kind, &field.name) {
            tracing::debug!(
                subject = %subject.name,
                context = %kind,
                previous = %previous,
                field = %field.name,
                "context slot declared twice; later field wins"
            );
        }
        tracing::trace!(subject = %subject.name, context = %kind, field = %field.name, "context bound");
    }
    bindings
}

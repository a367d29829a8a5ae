//! # 类型描述加载器
//!
//! ## 核心意图（Why）
//! - 编译的第一步：把主体句柄（类型名）解析为注册表中的声明，并计算主体身份；
//! - 身份包含全限定名、供代码生成器引用的符号路径，以及可作缓存/查找键的稳定结构签名。
//!
//! ## 行为契约（What）
//! - 空名称或未注册名称返回 [`CompileErrorKind::InvalidSubject`]；
//! - 同一缓存内对同名主体重复加载返回同一个 `Arc<SubjectIdentity>`，加载过程幂等、无副作用；
//! - 结构签名为规范化结构编码的 SHA-256 十六进制摘要，跨进程、跨运行稳定。
//!
//! ## 并发（How）
//! - [`IdentityCache`] 基于 `DashMap`，可通过 `Arc` 在并行编译的多个编译器之间共享。

use core::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    error::{CompileError, CompileErrorKind, Result},
    model::{TypeDecl, TypeName, registry::TypeRegistry},
};

/// 主体类型的稳定身份。
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubjectIdentity {
    name: TypeName,
    symbol: String,
    signature: String,
}

impl SubjectIdentity {
    fn of(decl: &TypeDecl) -> Self {
        Self {
            name: decl.name.clone(),
            symbol: decl.name.symbol(),
            signature: structural_signature(decl),
        }
    }

    /// 全限定名。
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// 符号路径，例如 `app::web::UserController`。
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// 64 位十六进制字符的结构签名。
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Debug for SubjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectIdentity")
            .field("name", &self.name.as_str())
            .field("signature", &&self.signature[..12.min(self.signature.len())])
            .finish()
    }
}

/// 主体身份缓存。
///
/// # 教案式注释
/// - **意图 (Why)**：签名计算需要遍历全部成员，多次编译或多个调度组件查询同一主体时复用结果；
/// - **契约 (What)**：以类型名为键；注册表在装载后只读，因此同名即同结构；
/// - **风险 (Trade-offs)**：若宿主在运行中替换注册表内容，应同时 [`clear`](Self::clear) 缓存。
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: DashMap<TypeName, Arc<SubjectIdentity>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SubjectIdentity>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn resolve(&self, decl: &TypeDecl) -> Arc<SubjectIdentity> {
        Arc::clone(
            self.entries
                .entry(decl.name.clone())
                .or_insert_with(|| Arc::new(SubjectIdentity::of(decl)))
                .value(),
        )
    }
}

/// 加载结果：注册表中的主体声明与其身份。
#[derive(Debug)]
pub struct LoadedSubject<'r> {
    pub decl: &'r TypeDecl,
    pub identity: Arc<SubjectIdentity>,
}

/// 类型描述加载器。
#[derive(Debug)]
pub struct TypeLoader<'r> {
    registry: &'r TypeRegistry,
    cache: Arc<IdentityCache>,
}

impl<'r> TypeLoader<'r> {
    pub fn new(registry: &'r TypeRegistry, cache: Arc<IdentityCache>) -> Self {
        Self { registry, cache }
    }

    /// 解析主体句柄。
    pub fn load(&self, subject: &str) -> Result<LoadedSubject<'r>> {
        if subject.is_empty() {
            return Err(CompileError::new(
                CompileErrorKind::InvalidSubject,
                subject,
                "no subject type supplied",
            ));
        }
        let decl = self.registry.get(subject).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::InvalidSubject,
                subject,
                "subject type is not present in the type registry",
            )
        })?;
        let identity = self.cache.resolve(decl);
        tracing::trace!(subject = %decl.name, signature = %identity.signature(), "subject loaded");
        Ok(LoadedSubject { decl, identity })
    }
}

/// 长度前缀编码器：每个字段写入 `u64` 小端长度再写入字节，列表先写元素个数。
///
/// 任何字段内容（包括含分隔符的类型名）都无法伪装成字段边界，因此不同结构的编码互不相同。
struct SignatureEncoder {
    hasher: Sha256,
}

impl SignatureEncoder {
    fn part(&mut self, part: &str) -> &mut Self {
        self.hasher.update((part.len() as u64).to_le_bytes());
        self.hasher.update(part.as_bytes());
        self
    }

    fn list<'a>(&mut self, items: impl ExactSizeIterator<Item = &'a str>) -> &mut Self {
        self.hasher.update((items.len() as u64).to_le_bytes());
        for item in items {
            self.part(item);
        }
        self
    }
}

/// 计算结构签名。
///
/// 按固定顺序编码：类型名、继承关系、标记、字段（按声明顺序）、方法（按声明顺序）。
fn structural_signature(decl: &TypeDecl) -> String {
    let mut encoder = SignatureEncoder { hasher: Sha256::new() };

    encoder.part("type").part(decl.name.as_str());
    if let Some(parent) = &decl.superclass {
        encoder.part("extends").part(parent.as_str());
    }
    for interface in &decl.implements {
        encoder.part("implements").part(interface.as_str());
    }
    if let Some(controller) = &decl.controller {
        encoder
            .part("controller")
            .part(controller.url.as_str())
            .part(controller.session.as_str());
    }
    if decl.interceptor {
        encoder.part("interceptor");
    }
    for field in &decl.fields {
        encoder
            .part("field")
            .part(field.name.as_str())
            .part(&field.ty.to_string());
        match &field.parameter {
            Some(marker) => {
                let converter = marker.converter.as_ref().map_or("", TypeName::as_str);
                encoder.part("parameter").part(converter);
            }
            None => {
                encoder.part("plain");
            }
        }
    }
    for method in &decl.methods {
        let params = method.params.iter().map(ToString::to_string).collect::<Vec<_>>();
        let returns = method.returns.as_ref().map(ToString::to_string).unwrap_or_default();
        encoder
            .part("method")
            .part(if method.public { "public" } else { "private" })
            .part(method.name.as_str())
            .list(params.iter().map(String::as_str))
            .part(&returns);
        match &method.action {
            Some(action) => {
                encoder
                    .part("action")
                    .part(action.content_type.as_str())
                    .list(action.intercepted_by.iter().map(TypeName::as_str));
            }
            None => {
                encoder.part("handler");
            }
        }
    }

    hex::encode(encoder.hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::SessionPolicy,
        model::{FieldDecl, MethodDecl, known},
    };

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                TypeDecl::new("app.web.UserController")
                    .controller("/user", SessionPolicy::Stateless)
                    .field(FieldDecl::new("name", known::STRING).bindable()),
            )
            .expect("registry")
    }

    #[test]
    fn missing_or_empty_subject_is_invalid() {
        let registry = registry();
        let loader = TypeLoader::new(&registry, Arc::default());
        for subject in ["", "app.web.Missing"] {
            let error = loader.load(subject).expect_err("invalid subject");
            assert_eq!(error.kind(), CompileErrorKind::InvalidSubject);
            assert_eq!(error.subject(), subject);
        }
    }

    #[test]
    fn repeated_loads_share_cached_identity() {
        let registry = registry();
        let cache = Arc::new(IdentityCache::new());
        let loader = TypeLoader::new(&registry, Arc::clone(&cache));

        let first = loader.load("app.web.UserController").expect("load");
        let second = loader.load("app.web.UserController").expect("load");
        assert!(Arc::ptr_eq(&first.identity, &second.identity));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.identity.symbol(), "app::web::UserController");
        assert_eq!(first.identity.signature().len(), 64);
    }

    #[test]
    fn signature_tracks_structure_not_cache() {
        let registry = registry();
        let a = TypeLoader::new(&registry, Arc::default())
            .load("app.web.UserController")
            .expect("load");
        let b = TypeLoader::new(&registry, Arc::default())
            .load("app.web.UserController")
            .expect("load");
        assert_eq!(a.identity.signature(), b.identity.signature());

        let changed = TypeDecl::new("app.web.UserController")
            .controller("/user", SessionPolicy::Stateful)
            .field(FieldDecl::new("name", known::STRING).bindable());
        assert_ne!(structural_signature(&changed), a.identity.signature());
    }

    #[test]
    fn separators_inside_names_do_not_collide() {
        let joined = TypeDecl::new("app.C").method(MethodDecl::new("m").param("a,b"));
        let split = TypeDecl::new("app.C").method(MethodDecl::new("m").param("a").param("b"));
        assert_ne!(joined, split);
        assert_ne!(structural_signature(&joined), structural_signature(&split));

        let tabbed = TypeDecl::new("app.D").field(FieldDecl::new("x\ty", known::STRING));
        let plain = TypeDecl::new("app.D").field(FieldDecl::new("x", "y\tspark.lang.String"));
        assert_ne!(structural_signature(&tabbed), structural_signature(&plain));
    }
}

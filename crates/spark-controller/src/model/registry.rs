//! # TypeRegistry：可枚举的类型描述全集
//!
//! ## 核心意图（Why）
//! - 替代运行期类型自省：编译器通过注册表按名称查找主体、拦截器与转换器，
//!   并沿继承链判定能力或查找继承来的公开方法；
//! - 允许从模式文件加载描述，让非 Rust 来源（代码生成器、构建脚本）也能提供控制器契约。
//!
//! ## 行为契约（What）
//! - 名称唯一，重复注册返回 [`SchemaError::DuplicateType`]；空名称返回 [`SchemaError::EmptyTypeName`]；
//! - 注册完成后注册表只读使用，编译器仅持有共享借用；
//! - 继承链遍历对环路免疫：已访问的名称不会重复展开。
//!
//! ## 模式文件格式（How）
//! ```toml
//! [[types]]
//! name = "app.web.UserController"
//! controller = { url = "/user", session = "stateless" }
//!
//! [[types.field]]
//! name = "name"
//! type = "spark.lang.String"
//! parameter = {}
//!
//! [[types.method]]
//! name = "view"
//! returns = "spark.api.Result"
//! action = { type = "text/html" }
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{TypeDecl, TypeName};
use crate::error::SchemaError;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(default)]
    types: Vec<TypeDecl>,
}

/// 类型描述注册表。
///
/// # 教案级注释
/// - **目标 (Why)**：集中保存全部类型声明，保证名称冲突在装载时即被捕获；
/// - **实现 (How)**：`BTreeMap<TypeName, TypeDecl>`，遍历顺序稳定，便于批量编译时输出可复现的日志；
/// - **契约 (What)**：查询接口全部接受 `&str`，调用方无需先构造 [`TypeName`]。
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeName, TypeDecl>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个类型声明。
    pub fn register(&mut self, decl: TypeDecl) -> Result<(), SchemaError> {
        if decl.name.is_empty() {
            return Err(SchemaError::EmptyTypeName);
        }
        if self.types.contains_key(decl.name.as_str()) {
            return Err(SchemaError::DuplicateType {
                name: decl.name.to_string(),
            });
        }
        self.types.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// 链式注册，便于在测试与演示中一次性组装注册表。
    pub fn with(mut self, decl: TypeDecl) -> Result<Self, SchemaError> {
        self.register(decl)?;
        Ok(self)
    }

    /// 从 TOML 模式文本加载。
    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = toml::from_str(text)?;
        Self::from_document(document)
    }

    /// 从 JSON 模式文本加载，结构与 TOML 相同。
    #[cfg(feature = "schema-json")]
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_str(text)?;
        Self::from_document(document)
    }

    fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for decl in document.types {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.values()
    }

    /// 携带控制器标记的全部类型，按名称排序。
    pub fn controllers(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.values().filter(|decl| decl.is_controller())
    }

    /// 给定类型是否携带拦截器标记。未注册的类型一律视为不合法。
    pub fn is_interceptor(&self, name: &str) -> bool {
        self.get(name).is_some_and(|decl| decl.interceptor)
    }

    /// 判定 `name` 是否可赋值给 `target`。
    ///
    /// # 教案级注释
    /// - **逻辑 (How)**：广度优先展开 `superclass` 与 `implements`；名称相同即命中，
    ///   未注册的中间类型只参与比较、不再展开；
    /// - **契约 (What)**：`name == target` 时直接返回 `true`，即使 `target` 本身未注册；
    /// - **风险 (Trade-offs)**：环形继承声明不会导致死循环，但也不会报错，由模式作者自行保证合理性。
    pub fn is_assignable_to(&self, name: &str, target: &str) -> bool {
        let mut queue = VecDeque::from([name]);
        let mut visited = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(decl) = self.get(current) {
                queue.extend(decl.superclass.iter().map(TypeName::as_str));
                queue.extend(decl.implements.iter().map(TypeName::as_str));
            }
        }
        false
    }

    /// 从 `name` 开始沿 `superclass` 向上的已注册声明链（包含自身）。
    pub fn superclass_chain<'a>(&'a self, name: &str) -> Vec<&'a TypeDecl> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::new();
        let mut cursor = self.get(name);
        while let Some(decl) = cursor {
            if !visited.insert(decl.name.as_str()) {
                break;
            }
            chain.push(decl);
            cursor = decl
                .superclass
                .as_ref()
                .and_then(|parent| self.get(parent.as_str()));
        }
        chain
    }
}

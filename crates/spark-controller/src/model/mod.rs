//! # model：控制器类型的显式描述
//!
//! ## 定位（Why）
//! - 编译器不依赖运行期反射，而是消费一份“成员列表 + 附着标记”的统一描述；
//!   描述既可由宿主在代码中构造，也可从模式文件（TOML/JSON）加载；
//! - 四个编译阶段只面向本模块的类型编程，因此无论描述来源如何，校验规则保持一致。
//!
//! ## 结构（What）
//! - [`TypeName`]：全限定名，`Arc<str>` 承载，克隆廉价；
//! - [`TypeRef`]：字段/参数/返回值的声明类型，区分原始类型与命名引用类型；
//! - [`TypeDecl`]、[`FieldDecl`]、[`MethodDecl`]：类型、字段、方法的声明；
//! - [`ControllerMarker`]、[`ParameterMarker`]、[`ActionMarker`]：三类声明式标记；
//! - [`FieldRole`]：字段在契约中的角色（普通字段 / 可绑定参数 / 上下文槽位）。

pub mod known;
pub mod registry;

use core::{borrow::Borrow, fmt};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{context::ContextKind, descriptor::SessionPolicy};

/// 类型的全限定名，例如 `app.web.UserController`。
///
/// - **契约 (What)**：以 `.` 分隔包路径与简单名；比较、哈希、排序均按字符串语义进行，
///   因此可以直接以 `&str` 作为映射键查询（实现了 [`Borrow<str>`]）。
/// - **实现 (How)**：内部为 `Arc<str>`，在描述符与绑定表之间共享时只增加引用计数。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// 以任意字符串构造类型名。
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// 借出字符串视图。
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 名称是否为空。空名称永远不能注册到 [`registry::TypeRegistry`]。
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 最后一个 `.` 之后的简单名。
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// 供代码生成阶段使用的符号路径：`app.web.UserController` → `app::web::UserController`。
    pub fn symbol(&self) -> String {
        self.0.replace('.', "::")
    }

    /// 是否等于给定的内建名称。
    pub fn is(&self, name: &str) -> bool {
        self.as_str() == name
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 原始值类型。
///
/// 可绑定参数必须是引用类型，以便“未赋值”可以被表达；这些类型一律被参数绑定阶段拒绝。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Primitive {
    /// 全部原始类型，顺序与关键字表一致。
    pub const ALL: [Primitive; 12] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
    ];

    /// 模式文件中使用的关键字。
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    /// 按关键字解析；非关键字返回 `None`。
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == keyword)
    }
}

/// 类型文本无法解析时的错误。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("type reference must not be empty")]
pub struct EmptyTypeRef;

/// 字段、参数或返回值的声明类型。
///
/// # 教案式说明
/// - **意图 (Why)**：参数绑定阶段需要区分“原始值类型”与“引用类型”，其余阶段只做精确的名称比较；
/// - **契约 (What)**：文本形式中原始类型关键字（`i32`、`bool` …）解析为 [`TypeRef::Primitive`]，
///   其他非空文本一律视为 [`TypeRef::Named`]；
/// - **实现 (How)**：serde 以字符串形式读写，模式文件中可直接写 `type = "spark.lang.String"`。
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Primitive(Primitive),
    Named(TypeName),
}

impl TypeRef {
    /// 构造命名引用类型。
    pub fn named(name: impl Into<TypeName>) -> Self {
        TypeRef::Named(name.into())
    }

    /// 解析类型文本。
    pub fn parse(text: &str) -> Result<Self, EmptyTypeRef> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmptyTypeRef);
        }
        Ok(match Primitive::from_keyword(text) {
            Some(primitive) => TypeRef::Primitive(primitive),
            None => TypeRef::named(text),
        })
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    /// 命名类型的名称；原始类型返回 `None`。
    pub fn as_named(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Primitive(_) => None,
        }
    }

    /// 是否精确等于给定名称的命名类型。
    pub fn is(&self, name: &str) -> bool {
        self.as_named().is_some_and(|named| named.is(name))
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(primitive) => f.write_str(primitive.keyword()),
            TypeRef::Named(name) => f.write_str(name.as_str()),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = EmptyTypeRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeRef::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl From<Primitive> for TypeRef {
    fn from(value: Primitive) -> Self {
        TypeRef::Primitive(value)
    }
}

impl From<&str> for TypeRef {
    /// 便捷转换：与 [`TypeRef::parse`] 一样先去除首尾空白，原始类型关键字解析为原始类型，
    /// 其余文本视为命名类型。
    fn from(value: &str) -> Self {
        let value = value.trim();
        Primitive::from_keyword(value)
            .map(TypeRef::Primitive)
            .unwrap_or_else(|| TypeRef::named(value))
    }
}

/// 类型级控制器标记：声明路由路径与会话策略。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerMarker {
    pub url: String,
    #[serde(default)]
    pub session: SessionPolicy,
}

/// 字段级可绑定参数标记。
///
/// `converter` 为空或等于 [`known::OBJECT`] 时视为未声明转换器。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter: Option<TypeName>,
}

impl ParameterMarker {
    /// 真正需要校验的转换器：剔除未声明与根类型占位两种情况。
    pub fn declared_converter(&self) -> Option<&TypeName> {
        self.converter
            .as_ref()
            .filter(|converter| !converter.is(known::OBJECT))
    }
}

/// 方法级 Action 标记。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionMarker {
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intercepted_by: Vec<TypeName>,
}

impl Default for ActionMarker {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
            intercepted_by: Vec::new(),
        }
    }
}

impl ActionMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// 追加一个拦截器声明，保持声明顺序。
    pub fn intercepted_by(mut self, interceptor: impl Into<TypeName>) -> Self {
        self.intercepted_by.push(interceptor.into());
        self
    }
}

fn default_content_type() -> String {
    known::DEFAULT_CONTENT_TYPE.to_owned()
}

fn default_public() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 字段在控制器契约中的角色。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// 与契约无关的普通字段。
    Plain,
    /// 携带可绑定参数标记且类型不是上下文类型。
    Parameter,
    /// 声明类型精确匹配某个上下文类型；无论是否携带参数标记都归入此类。
    Context(ContextKind),
}

/// 字段声明。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<ParameterMarker>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            parameter: None,
        }
    }

    /// 标记为可绑定参数（不带转换器）。
    pub fn bindable(mut self) -> Self {
        self.parameter = Some(ParameterMarker::default());
        self
    }

    /// 标记为可绑定参数并声明转换器。
    pub fn bindable_with(mut self, converter: impl Into<TypeName>) -> Self {
        self.parameter = Some(ParameterMarker {
            converter: Some(converter.into()),
        });
        self
    }

    pub fn role(&self) -> FieldRole {
        if let Some(kind) = ContextKind::from_type(&self.ty) {
            FieldRole::Context(kind)
        } else if self.parameter.is_some() {
            FieldRole::Parameter
        } else {
            FieldRole::Plain
        }
    }
}

/// 方法声明。`returns` 为 `None` 表示方法没有返回值。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeRef>,
    #[serde(default = "default_public", skip_serializing_if = "is_true")]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionMarker>,
}

impl MethodDecl {
    /// 构造无参、无返回值的公开方法。
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            public: true,
            action: None,
        }
    }

    pub fn param(mut self, ty: impl Into<TypeRef>) -> Self {
        self.params.push(ty.into());
        self
    }

    pub fn returning(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn action(mut self, marker: ActionMarker) -> Self {
        self.action = Some(marker);
        self
    }

    /// 参数列表是否恰好为 `params`。
    pub fn takes(&self, params: &[TypeRef]) -> bool {
        self.params == params
    }
}

/// 单个宿主类型的完整声明。
///
/// # 教案式说明
/// - **意图 (Why)**：以显式数据替代运行期反射，使四个编译阶段对任何来源的描述都保持一致；
/// - **契约 (What)**：
///   - `fields`/`methods` 仅包含本类型*直接声明*的成员，顺序即枚举顺序；
///   - `superclass` 与 `implements` 只用于能力判定（转换器）与继承方法查找（setter）；
///   - `controller` 为空的类型不能作为编译主体；`interceptor` 标记决定能否出现在拦截器链中；
/// - **风险 (Trade-offs)**：声明顺序直接影响“同类上下文字段后者覆盖前者”的结果，构造描述时需保持源顺序。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    pub name: TypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<TypeName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<TypeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerMarker>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub interceptor: bool,
    #[serde(default, rename = "field", skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDecl>,
    #[serde(default, rename = "method", skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDecl>,
}

impl TypeDecl {
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            implements: Vec::new(),
            controller: None,
            interceptor: false,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// 附加控制器标记。
    pub fn controller(mut self, url: impl Into<String>, session: SessionPolicy) -> Self {
        self.controller = Some(ControllerMarker {
            url: url.into(),
            session,
        });
        self
    }

    /// 附加拦截器标记。
    pub fn interceptor(mut self) -> Self {
        self.interceptor = true;
        self
    }

    pub fn extends(mut self, superclass: impl Into<TypeName>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<TypeName>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// 按名称查找本类型直接声明的方法（首个命中）。
    pub fn declared_method(&self, name: &str, params: &[TypeRef]) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.takes(params))
    }

    /// 是否可作为编译主体。
    pub fn is_controller(&self) -> bool {
        self.controller.is_some()
    }
}

#![deny(unsafe_code)]

//! # spark-controller
//!
//! ## 定位与职责（Why）
//! - 控制器契约编译器：给定一个携带声明式标记的控制器类型，检视其结构、校验契约的内部一致性，
//!   并产出调度器可直接使用的只读描述符（Action 表、参数表、拦截器链、上下文绑定）；
//! - 调度器据此路由请求，无需在每次调用时重新检视类型。
//!
//! ## 架构嵌入（Where）
//! - `model` 模块定义类型描述与注册表，替代运行期反射；
//! - `loader`、`context`、`parameter`、`action` 四个模块各自实现一个编译阶段；
//! - `compiler` 模块以状态机串联各阶段，`descriptor` 模块定义编译产物；
//! - `error` 模块集中定义 `thiserror` 风格的错误与稳定错误码。
//!
//! ## 使用方式（How）
//! ```
//! use spark_controller::{ControllerCompiler, SessionPolicy, TypeRegistry};
//! use spark_controller::model::{ActionMarker, MethodDecl, TypeDecl, known};
//!
//! let registry = TypeRegistry::new()
//!     .with(
//!         TypeDecl::new("app.HelloController")
//!             .controller("/hello", SessionPolicy::Stateless)
//!             .method(MethodDecl::new("view").returning(known::RESULT).action(ActionMarker::new())),
//!     )
//!     .expect("registry");
//!
//! let descriptor = ControllerCompiler::new(&registry, "app.HelloController")
//!     .compile()
//!     .expect("compiles");
//! assert_eq!(descriptor.url(), "/hello");
//! assert_eq!(descriptor.action("view").map(|a| a.content_type()), Some("text/html"));
//! ```
//!
//! ## Feature 策略（Trade-offs）
//! - `schema-json`（默认开启）允许从 JSON 加载类型描述；TOML 加载始终可用。

pub mod action;
pub mod compiler;
pub mod context;
pub mod descriptor;

/// 错误类型与稳定错误码集中声明处。
///
/// - **意图说明 (Why)**：编译失败全部是结构性错误，调用方需要按分类决定中止还是跳过；
/// - **契约定位 (What)**：[`CompileError`] 携带主体、成员、原因与阶段，[`SchemaError`] 描述模式加载失败。
pub mod error;
pub mod loader;
pub mod model;
pub mod parameter;

pub use action::{ActionBinding, InterceptorRef};
pub use compiler::{CompilerState, ControllerCompiler};
pub use context::{ContextBindings, ContextKind};
pub use descriptor::{ControllerDescriptor, MethodRef, SessionPolicy, UnknownSessionPolicy};
pub use error::{CompileError, CompileErrorKind, SchemaError};
pub use loader::{IdentityCache, SubjectIdentity};
pub use model::registry::TypeRegistry;
pub use parameter::ParameterBinding;

#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = "spark-hosting: 为控制器装载、会话策略与启动引导提供宿主装配工具。"]

pub mod application;
pub mod bootstrap;
pub mod builder;
pub mod config;
pub mod logging;
pub mod session;
mod table;

pub use application::{Application, DispatchError, ResolvedAction};
pub use bootstrap::{Bootstrap, BootstrapConfig, BootstrapError, Server, ServerFactory, ServerRegistry};
pub use builder::{ApplicationBuildError, ApplicationBuilder};
pub use config::{ApplicationConfig, CompileConfig, ConfigError, FailurePolicy, SessionConfig};
pub use session::{
    MemorySessionFactory, Session, SessionContext, SessionError, SessionFactory, SessionRequest,
    SessionStrategy, StatelessSessionFactory,
};
pub use table::{ControllerTable, RouteConflict};

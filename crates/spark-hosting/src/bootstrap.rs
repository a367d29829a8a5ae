//! # 启动引导
//!
//! ## 核心意图（Why）
//! - 进程入口在装载任何控制器之前需要确定两件事：使用哪种服务器实现、应用基础目录在哪里；
//! - 两者都来自环境变量，缺省时分别回退到 `tcp` 与当前工作目录。
//!
//! ## 行为契约（What）
//! - `SPARK_SERVER`：服务器实现标识，在 [`ServerRegistry`] 中查找；
//! - `SPARK_BASE`：基础目录，必须是已存在的目录，解析为绝对路径；
//! - [`Bootstrap::start`] 先校验目录布局（基础目录下必须存在 `lib/`），再创建服务器并调用其 `init`。

use core::fmt;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

/// 选择服务器实现的环境变量。
pub const SERVER_VAR: &str = "SPARK_SERVER";
/// 指定基础目录的环境变量。
pub const BASE_VAR: &str = "SPARK_BASE";
/// 未指定时使用的服务器实现。
pub const DEFAULT_SERVER: &str = "tcp";
/// 基础目录下必须存在的库目录。
pub const LIBRARY_DIR: &str = "lib";

/// 启动失败。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("`{path}` is not a valid directory")]
    NotADirectory { path: PathBuf },
    #[error("library directory `{path}` does not exist")]
    MissingLibrary { path: PathBuf },
    #[error("cannot determine the working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    #[error("unknown server implementation `{name}`")]
    UnknownServer { name: String },
    #[error("server implementation `{name}` is already registered")]
    DuplicateServer { name: String },
    #[error("server `{name}` failed to initialise: {reason}")]
    Init { name: String, reason: String },
}

/// 启动配置：服务器标识与绝对化的基础目录。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    server: String,
    base_dir: PathBuf,
}

impl BootstrapConfig {
    /// 直接以给定值构造，并校验基础目录。
    pub fn new(server: impl Into<String>, base_dir: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(BootstrapError::NotADirectory {
                path: base_dir.to_path_buf(),
            });
        }
        let base_dir = std::path::absolute(base_dir).map_err(BootstrapError::WorkingDirectory)?;
        Ok(Self {
            server: server.into(),
            base_dir,
        })
    }

    /// 从进程环境解析。
    pub fn from_env() -> Result<Self, BootstrapError> {
        let fallback = std::env::current_dir().map_err(BootstrapError::WorkingDirectory)?;
        Self::from_lookup(|key| std::env::var(key).ok(), fallback)
    }

    /// 以任意键值来源解析，`fallback_dir` 在未设置 `SPARK_BASE` 时使用。
    pub fn from_lookup<F>(lookup: F, fallback_dir: impl Into<PathBuf>) -> Result<Self, BootstrapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = lookup(SERVER_VAR)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_owned());
        let base_dir = lookup(BASE_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback_dir.into());
        Self::new(server, base_dir)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn library_dir(&self) -> PathBuf {
        self.base_dir.join(LIBRARY_DIR)
    }

    /// 校验目录布局：`lib/` 必须存在且为目录。
    pub fn validate_layout(&self) -> Result<(), BootstrapError> {
        let library = self.library_dir();
        if !library.is_dir() {
            return Err(BootstrapError::MissingLibrary { path: library });
        }
        Ok(())
    }
}

/// 服务器实现。
pub trait Server: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// 初始化服务器，绑定监听端口、装载应用等。
    fn init(&self, config: &BootstrapConfig) -> Result<(), BootstrapError>;
}

/// 服务器工厂。每个工厂持有其实现的单例。
pub trait ServerFactory: Send + Sync + fmt::Debug {
    fn server(&self) -> Arc<dyn Server>;
}

/// `ServerRegistry` 维护服务器标识到工厂的映射。
///
/// - **契约 (What)**：标识唯一，重复注册返回 [`BootstrapError::DuplicateServer`]；
/// - **实现 (How)**：`BTreeMap` 保证 [`names`](Self::names) 输出稳定，便于在错误信息中列出可选值。
#[derive(Debug, Default)]
pub struct ServerRegistry {
    factories: BTreeMap<String, Arc<dyn ServerFactory>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ServerFactory>,
    ) -> Result<(), BootstrapError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(BootstrapError::DuplicateServer { name });
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServerFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// 启动引导器。
#[derive(Debug)]
pub struct Bootstrap {
    config: BootstrapConfig,
    servers: ServerRegistry,
}

impl Bootstrap {
    pub fn new(config: BootstrapConfig, servers: ServerRegistry) -> Self {
        Self { config, servers }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// 校验布局、选出服务器并初始化。
    pub fn start(&self) -> Result<Arc<dyn Server>, BootstrapError> {
        tracing::info!(
            server = self.config.server(),
            base = %self.config.base_dir().display(),
            "starting spark"
        );
        self.config.validate_layout()?;
        let factory = self
            .servers
            .get(self.config.server())
            .ok_or_else(|| BootstrapError::UnknownServer {
                name: self.config.server().to_owned(),
            })?;
        let server = factory.server();
        if let Err(error) = server.init(&self.config) {
            tracing::error!(server = server.name(), error = %error, "failed to start spark");
            return Err(error);
        }
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingServer {
        inits: AtomicUsize,
    }

    impl Server for CountingServer {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&self, _config: &BootstrapConfig) -> Result<(), BootstrapError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct SingletonFactory {
        server: Arc<CountingServer>,
    }

    impl ServerFactory for SingletonFactory {
        fn server(&self) -> Arc<dyn Server> {
            self.server.clone()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_fall_back_to_tcp_and_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BootstrapConfig::from_lookup(no_env, dir.path()).expect("config");
        assert_eq!(config.server(), DEFAULT_SERVER);
        assert!(config.base_dir().is_absolute());
        let expected = std::path::absolute(dir.path()).expect("absolute");
        assert_eq!(config.base_dir(), expected.as_path());
    }

    #[test]
    fn environment_overrides_are_honoured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().to_string_lossy().into_owned();
        let lookup = |key: &str| match key {
            SERVER_VAR => Some("quic".to_owned()),
            BASE_VAR => Some(base.clone()),
            _ => None,
        };
        let config = BootstrapConfig::from_lookup(lookup, "/nonexistent").expect("config");
        assert_eq!(config.server(), "quic");
    }

    #[test]
    fn non_directory_base_is_rejected() {
        let file = tempfile::NamedTempFile::new().expect("file");
        assert!(matches!(
            BootstrapConfig::from_lookup(no_env, file.path()),
            Err(BootstrapError::NotADirectory { .. })
        ));
    }

    #[test]
    fn start_requires_library_directory_then_inits_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = Arc::new(SingletonFactory::default());
        let mut servers = ServerRegistry::new();
        servers.register("tcp", factory.clone()).expect("register");
        assert!(matches!(
            servers.register("tcp", factory.clone()),
            Err(BootstrapError::DuplicateServer { .. })
        ));

        let config = BootstrapConfig::from_lookup(no_env, dir.path()).expect("config");
        let bootstrap = Bootstrap::new(config, servers);
        assert!(matches!(bootstrap.start(), Err(BootstrapError::MissingLibrary { .. })));

        std::fs::create_dir(dir.path().join(LIBRARY_DIR)).expect("lib dir");
        let server = bootstrap.start().expect("start");
        assert_eq!(server.name(), "counting");
        assert_eq!(factory.server.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_server_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join(LIBRARY_DIR)).expect("lib dir");
        let config = BootstrapConfig::new("netty", dir.path()).expect("config");
        let bootstrap = Bootstrap::new(config, ServerRegistry::new());
        assert!(matches!(
            bootstrap.start(),
            Err(BootstrapError::UnknownServer { name }) if name == "netty"
        ));
    }
}

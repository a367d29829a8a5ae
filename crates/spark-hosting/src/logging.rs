//! # 日志安装
//!
//! 以 `tracing-subscriber` 组装 `EnvFilter + fmt` 并设为全局 Subscriber。
//! 过滤规则取自 `RUST_LOG`，未设置或无法解析时使用 `info`。
//!
//! - 重复调用返回 [`LoggingError::AlreadyInstalled`]；
//! - 外部已设置全局 Subscriber 时返回 [`LoggingError::SubscriberAlreadySet`]，不会覆盖。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

/// 安装状态，确保 `install` 仅执行一次。
static INSTALLED: OnceLock<()> = OnceLock::new();

/// 未设置 `RUST_LOG` 时的默认过滤规则。
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logging is already installed")]
    AlreadyInstalled,
    #[error("a global tracing subscriber has already been set by someone else")]
    SubscriberAlreadySet,
    #[error("failed to set the global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] dispatcher::SetGlobalDefaultError),
}

/// 安装全局日志。
pub fn install() -> Result<(), LoggingError> {
    install_with(DEFAULT_FILTER)
}

/// 以给定的默认过滤规则安装全局日志；`RUST_LOG` 仍然优先。
pub fn install_with(default_filter: &str) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Err(LoggingError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(LoggingError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    INSTALLED
        .set(())
        .map_err(|_| LoggingError::AlreadyInstalled)
}

fn env_filter(default_filter: &str) -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok(), default_filter)
}

fn filter_from(directives: Option<String>, default_filter: &str) -> EnvFilter {
    directives.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 全局 Subscriber 只能设置一次，且测试二进制中的 `traced_test` 也依赖它，这里只验证过滤规则。
    #[test]
    fn filter_prefers_valid_env_directives() {
        assert_eq!(filter_from(Some("warn".to_owned()), DEFAULT_FILTER).to_string(), "warn");
        assert_eq!(filter_from(None, DEFAULT_FILTER).to_string(), "info");
        assert_eq!(
            filter_from(Some("spark_hosting=notalevel".to_owned()), "debug").to_string(),
            "debug"
        );
    }
}

//! # 应用配置
//!
//! ## 核心意图（Why）
//! - 把“控制器编译失败时整体中止还是跳过”“全局会话策略”这类装载期决策从代码中抽离，
//!   交给部署方通过 TOML 文件声明；
//! - 未出现的表或键一律取默认值，空文件即是合法配置。
//!
//! ## 文件格式（What）
//! ```toml
//! [session]
//! policy = "stateless"   # none | stateless | stateful（默认）
//! idle_timeout_secs = 1800  # 可选：有状态会话的空闲淘汰时间，必须大于 0
//!
//! [compile]
//! on_error = "skip"      # abort（默认）| skip
//! ```

use std::path::Path;

use serde::Deserialize;
use spark_controller::SessionPolicy;
use thiserror::Error;

/// 单个控制器编译失败时的处理策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 任一控制器失败即中止整个应用装载。
    #[default]
    Abort,
    /// 记录告警并跳过失败的控制器，其余控制器照常装载。
    Skip,
}

/// `[session]` 表。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// 声明为 `stateful` 的控制器实际使用的会话策略。
    #[serde(default)]
    pub policy: SessionPolicy,
    /// 有状态会话空闲多久后被淘汰；未设置时会话只在工厂停止时释放。
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

/// `[compile]` 表。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileConfig {
    #[serde(default)]
    pub on_error: FailurePolicy,
}

/// 应用装载配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub compile: CompileConfig,
}

/// 读取或解析配置失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read application config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid application config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ApplicationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 从文件加载配置。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 链式覆盖失败策略，便于测试与嵌入式宿主。
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.compile.on_error = policy;
        self
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ApplicationConfig::from_toml_str("").expect("empty config");
        assert_eq!(config.session.policy, SessionPolicy::Stateful);
        assert_eq!(config.compile.on_error, FailurePolicy::Abort);
        assert_eq!(config.session.idle_timeout_secs, None);
    }

    #[test]
    fn tables_override_defaults() {
        let config = ApplicationConfig::from_toml_str(
            r#"
            [session]
            policy = "stateless"
            idle_timeout_secs = 600

            [compile]
            on_error = "skip"
            "#,
        )
        .expect("config");
        assert_eq!(config.session.policy, SessionPolicy::Stateless);
        assert_eq!(config.session.idle_timeout_secs, Some(600));
        assert_eq!(config.compile.on_error, FailurePolicy::Skip);
    }

    #[test]
    fn unknown_keys_and_values_are_rejected() {
        assert!(matches!(
            ApplicationConfig::from_toml_str("[session]\nttl = 30"),
            Err(ConfigError::Parse(_))
        ));
        assert!(ApplicationConfig::from_toml_str("[compile]\non_error = \"retry\"").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let error = ApplicationConfig::from_path("/definitely/not/here.toml").expect_err("missing");
        assert!(error.to_string().contains("/definitely/not/here.toml"));
    }
}

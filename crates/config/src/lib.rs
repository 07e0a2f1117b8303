//! 统一配置中心
//!
//! 提供中继服务的全局配置管理，包括：
//! - HTTP 服务监听地址与静态资源目录
//! - 广播中心队列容量与策略
//! - 会话（身份附加）设置
//! - 日志过滤
//!
//! 加载顺序：默认值 -> 可选配置文件（`RELAY_CONFIG_FILE`）-> 环境变量（`RELAY_*`，
//! 以 `__` 分隔层级，例如 `RELAY_HUB__QUEUE_CAPACITY=2048`）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 指定配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "RELAY_CONFIG_FILE";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "RELAY_";

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// 广播中心配置
    #[serde(default)]
    #[validate(nested)]
    pub hub: HubConfig,
    /// 会话配置
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// 静态资源目录，`None` 表示不提供静态文件
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1337,
            static_dir: Some("public".into()),
        }
    }
}

/// 广播中心配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HubConfig {
    /// 事件队列容量
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
    /// 每个连接的发送队列容量，写满视为对端失效
    #[validate(range(min = 1))]
    pub outbound_capacity: usize,
    /// 广播时是否回送给发送者
    pub include_sender: bool,
    /// 事件队列写满时的处理策略
    pub overflow: OverflowPolicy,
    /// 收到无法解析的消息时的处理策略
    pub malformed: MalformedPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            outbound_capacity: 64,
            include_sender: true,
            overflow: OverflowPolicy::RejectNew,
            malformed: MalformedPolicy::Disconnect,
        }
    }
}

/// 事件队列溢出策略（仅作用于入站消息，连接/断开事件总是等待队列空间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 拒绝新消息并计数
    RejectNew,
    /// 读取任务等待队列空间
    Backpressure,
}

/// 无法解析的入站消息处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// 断开该连接
    Disconnect,
    /// 丢弃该条消息，继续读取
    Skip,
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// 携带会话令牌的 Cookie 名称
    #[validate(length(min = 1))]
    pub cookie_name: String,
    /// 令牌有效期（分钟）
    #[validate(range(min = 1))]
    pub token_ttl_minutes: i64,
    /// 是否拒绝没有有效会话的连接
    pub require_identity: bool,
    /// 过期令牌清理间隔（秒）
    #[validate(range(min = 1))]
    pub purge_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "token".into(),
            token_ttl_minutes: 61,
            require_identity: false,
            purge_interval_seconds: 60,
        }
    }
}

/// 日志配置，`RUST_LOG` 优先
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl AppConfig {
    /// 构建配置来源链
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = figment.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "127.0.0.1:1337");
        assert!(config.hub.include_sender);
        assert_eq!(config.hub.overflow, OverflowPolicy::RejectNew);
        assert_eq!(config.hub.malformed, MalformedPolicy::Disconnect);
        assert_eq!(config.session.cookie_name, "token");
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 9000

                [hub]
                queue_capacity = 16
                outbound_capacity = 4
                include_sender = true
                overflow = "backpressure"
                malformed = "skip"
                "#,
            )?;
            jail.set_env(CONFIG_FILE_ENV, "relay.toml");
            jail.set_env("RELAY_HUB__INCLUDE_SENDER", "false");
            jail.set_env("RELAY_SERVER__PORT", "9001");

            let config = AppConfig::load().map_err(|err| err.to_string())?;
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 9001);
            assert_eq!(config.hub.queue_capacity, 16);
            assert_eq!(config.hub.outbound_capacity, 4);
            assert!(!config.hub.include_sender);
            assert_eq!(config.hub.overflow, OverflowPolicy::Backpressure);
            assert_eq!(config.hub.malformed, MalformedPolicy::Skip);
            // 未出现在文件中的分组保持默认值
            assert_eq!(config.session.token_ttl_minutes, 61);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file_is_detected_by_extension() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.yaml",
                "session:\n  cookie_name: sid\n  token_ttl_minutes: 5\n  require_identity: true\n  purge_interval_seconds: 10\n",
            )?;
            jail.set_env(CONFIG_FILE_ENV, "relay.yaml");

            let config = AppConfig::load().map_err(|err| err.to_string())?;
            assert_eq!(config.session.cookie_name, "sid");
            assert!(config.session.require_identity);
            Ok(())
        });
    }

    #[test]
    fn test_zero_capacity_fails_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_HUB__QUEUE_CAPACITY", "0");

            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }

    #[test]
    fn test_unparsable_value_is_an_extract_error() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_HUB__OVERFLOW", "drop_everything");

            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Extract(_))));
            Ok(())
        });
    }
}

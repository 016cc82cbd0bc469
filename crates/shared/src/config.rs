//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。
//! 配置对象在进程启动时构造一次，随后以只读方式向下传递，不存在全局可变状态。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Kafka 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub auto_offset_reset: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            consumer_group: "account-mailer".to_string(),
            auto_offset_reset: "earliest".to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 是否输出 JSON 结构化日志，否则为人类可读格式
    pub json_logs: bool,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

/// 外部协作服务配置
///
/// 令牌、成员查询、通知发送三个 HTTP 服务的地址与凭证。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub auth_api_url: String,
    pub notify_api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// 单次外部调用的超时上限，超时按失败处理
    pub request_timeout_seconds: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            auth_api_url: "http://localhost:5000/api/v1".to_string(),
            notify_api_url: "http://localhost:5001/api/v1".to_string(),
            token_url: "http://localhost:8081/auth/realms/bcregistry/protocol/openid-connect/token"
                .to_string(),
            client_id: "account-mailer".to_string(),
            client_secret: String::new(),
            request_timeout_seconds: 30,
        }
    }
}

impl ServicesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// 邮件分发配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// 消费的 topic
    pub topic: String,
    /// 模板中的站点链接，未配置时不写入模板上下文
    pub web_url: Option<String>,
    /// 退款申请事件未携带收件人时使用的收件地址
    pub refund_request_recipients: Vec<String>,
    /// 只记录日志不真正发送，用于联调
    pub dry_run: bool,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            topic: "account-mailer".to_string(),
            web_url: None,
            refund_request_recipients: Vec::new(),
            dry_run: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub kafka: KafkaConfig,
    pub observability: ObservabilityConfig,
    pub services: ServicesConfig,
    pub mailer: MailerConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（MAILER_ 前缀，双下划线分隔层级，如 MAILER_KAFKA__BROKERS -> kafka.brokers）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("MAILER_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(service_name, Path::new(&config_dir), &env)
    }

    /// 从指定目录加载，供 `load` 和测试复用
    pub fn load_from(service_name: &str, config_dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{env}.toml"))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{service_name}.toml"))).required(false),
            )
            .add_source(
                Environment::with_prefix("MAILER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mailer.refund_request_recipients")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.kafka.consumer_group, "account-mailer");
        assert_eq!(config.mailer.topic, "account-mailer");
        assert_eq!(config.services.request_timeout(), Duration::from_secs(30));
        assert!(!config.mailer.dry_run);
        assert!(config.observability.metrics_enabled);
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let dir = std::env::temp_dir().join("account-mailer-config-missing");
        let config = AppConfig::load_from("account-mailer", &dir, "test").unwrap();

        assert_eq!(config.service_name, "account-mailer");
        assert_eq!(config.environment, "test");
        assert_eq!(config.kafka.brokers, "localhost:9092");
    }

    #[test]
    fn test_load_from_layers_service_file_over_default() {
        let dir = std::env::temp_dir().join(format!("account-mailer-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            "[mailer]\ntopic = \"from-default\"\ndry_run = true\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("account-mailer.toml"),
            "[mailer]\ntopic = \"from-service\"\nrefund_request_recipients = [\"refunds@example.com\"]\n\n[services]\nrequest_timeout_seconds = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from("account-mailer", &dir, "production").unwrap();

        assert_eq!(config.mailer.topic, "from-service");
        assert!(config.mailer.dry_run);
        assert_eq!(
            config.mailer.refund_request_recipients,
            vec!["refunds@example.com".to_string()]
        );
        assert_eq!(config.services.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.environment, "production");

        std::fs::remove_dir_all(&dir).ok();
    }
}

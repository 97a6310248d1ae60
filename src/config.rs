use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
const DEFAULT_USER_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v21.0";
const DEFAULT_FLOW_KEY_FILE: &str = "whatsapp_flow_private_key.pem";

/// WhatsApp Business (Graph API) settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL
    #[serde(default = "default_graph_api_url")]
    pub api_url: String,

    /// Sender phone number id
    pub phone_number_id: String,

    /// Bearer token for the Graph API
    #[validate(length(min = 1))]
    pub access_token: String,

    /// Shared secret echoed back during webhook subscription
    #[validate(length(min = 1))]
    pub verify_token: String,

    /// Commerce catalog id; catalog features degrade gracefully without it
    #[serde(default)]
    pub catalog_id: Option<String>,

    /// Flow id of the published onboarding Flow
    pub onboarding_flow_id: String,
}

/// Paystack gateway settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaystackConfig {
    #[serde(default = "default_paystack_base_url")]
    pub base_url: String,

    /// Secret key; without it the adapter returns placeholder links
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Public base URL of this service, used for payment callback URLs
    #[serde(default)]
    pub app_base_url: Option<String>,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            base_url: default_paystack_base_url(),
            secret_key: None,
            app_base_url: None,
        }
    }
}

/// Private key material for the encrypted Flow exchange.
///
/// Resolution order: base64 PEM > literal PEM > file path > default file.
/// Environment variables win over files so that secretless container
/// platforms can inject the key without a mounted volume.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowKeyConfig {
    #[serde(default)]
    pub private_key_base64: Option<String>,

    #[serde(default)]
    pub private_key_pem: Option<String>,

    #[serde(default)]
    pub private_key_path: Option<String>,

    #[serde(default)]
    pub private_key_passphrase: Option<String>,
}

impl FlowKeyConfig {
    pub fn default_key_file() -> &'static str {
        DEFAULT_FLOW_KEY_FILE
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Outbound HTTP timeout applied to catalog/payment/messaging calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Webhook job queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Conversation sessions older than this are treated as absent
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// TTL of the user-existence cache
    #[serde(default = "default_user_cache_ttl_secs")]
    pub user_cache_ttl_secs: u64,

    #[validate]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub paystack: PaystackConfig,

    #[serde(default)]
    pub flow: FlowKeyConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}
fn default_user_cache_ttl_secs() -> u64 {
    DEFAULT_USER_CACHE_TTL_SECS
}
fn default_paystack_base_url() -> String {
    DEFAULT_PAYSTACK_BASE_URL.to_string()
}
fn default_graph_api_url() -> String {
    DEFAULT_GRAPH_API_URL.to_string()
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from (in increasing priority):
/// 1. Built-in defaults
/// 2. `config/default.toml` and `config/<env>.toml` if present
/// 3. Environment variables (`APP__` prefix, `__` separator)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://commerce.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("whatsapp_commerce_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whatsapp_config() -> WhatsAppConfig {
        WhatsAppConfig {
            api_url: default_graph_api_url(),
            phone_number_id: "123456".into(),
            access_token: "token".into(),
            verify_token: "verify".into(),
            catalog_id: Some("cat-1".into()),
            onboarding_flow_id: "2264166450676386".into(),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "0.0.0.0".into(),
            port: default_port(),
            environment: "development".into(),
            log_level: default_log_level(),
            log_json: false,
            http_timeout_secs: default_http_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            session_ttl_secs: default_session_ttl_secs(),
            user_cache_ttl_secs: default_user_cache_ttl_secs(),
            whatsapp: whatsapp_config(),
            paystack: PaystackConfig::default(),
            flow: FlowKeyConfig::default(),
        };

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.http_timeout_secs, 10);
        assert_eq!(cfg.session_ttl_secs, 1800);
        assert!(cfg.is_development());
        assert_eq!(cfg.paystack.base_url, "https://api.paystack.co");
        assert!(cfg.paystack.secret_key.is_none());
    }

    #[test]
    fn validation_rejects_empty_access_token() {
        let mut whatsapp = whatsapp_config();
        whatsapp.access_token = String::new();
        assert!(whatsapp.validate().is_err());
    }
}

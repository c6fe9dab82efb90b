use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT verification secret (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Tax rate applied to booking subtotals (e.g. 0.18 for 18% GST)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// ISO 4217 currency for gateway orders
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Payment gateway identifier (e.g. "razorpay")
    #[serde(default = "default_gateway")]
    pub gateway: String,

    /// Gateway REST base URL
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    /// Gateway API key id (basic-auth username)
    pub gateway_key_id: String,

    /// Gateway API key secret; also signs checkout confirmations
    pub gateway_key_secret: String,

    /// Shared secret for webhook body signatures
    pub gateway_webhook_secret: String,

    /// Outbound gateway call timeout (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_tax_rate() -> Decimal {
    Decimal::new(18, 2)
}
fn default_currency() -> String {
    "INR".to_string()
}
fn default_gateway() -> String {
    "razorpay".to_string()
}
fn default_gateway_base_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "dev"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Load configuration from `config/*.toml` plus `APP__`-prefixed
/// environment variables (env wins). Development gets permissive
/// fallbacks so the server starts without a config file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let is_dev = environment == "development" || environment == "dev";

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?;

    if is_dev {
        builder = builder
            .set_default("database_url", "sqlite::memory:")?
            .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
            .set_default("gateway_key_id", "rzp_test_key")?
            .set_default("gateway_key_secret", "rzp_test_secret")?
            .set_default("gateway_webhook_secret", "whsec_test")?;
    }

    let base_path = Path::new(CONFIG_DIR).join("default.toml");
    if base_path.exists() {
        builder = builder.add_source(File::from(base_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(config)
}

/// Initialize the global tracing subscriber once at process start.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }

    info!(log_level, json, "tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_tax_rate_is_eighteen_percent() {
        assert_eq!(default_tax_rate(), dec!(0.18));
    }

    #[test]
    fn development_defaults_allow_startup_without_config_file() {
        std::env::set_var("APP_ENV", "development");
        let cfg = load_config().expect("dev config should load from defaults");
        assert!(cfg.is_development());
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.currency, "INR");
        assert_eq!(cfg.gateway, "razorpay");
    }
}

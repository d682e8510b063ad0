use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    BaseHttpClientConfig, MarketDataConfig, NotificationConfig, StreamConfig, TelegramConfig,
    deserialize_duration_from_seconds, deserialize_url, serialize_duration_to_seconds,
};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for max_in_flight_per_watch.
fn default_max_in_flight_per_watch() -> usize {
    16
}

fn default_rpc_url() -> Url {
    Url::parse("https://eth.llamarpc.com").expect("static url is valid")
}

/// Application configuration for buywatch.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database holding watches and owners.
    pub database_url: String,

    /// JSON-RPC endpoint used for wallet balance lookups.
    #[serde(default = "default_rpc_url", deserialize_with = "deserialize_url")]
    pub rpc_url: Url,

    /// Realtime trade stream configuration.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Telegram delivery configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Market data provider configuration.
    #[serde(default)]
    pub market_data: MarketDataConfig,

    /// Configuration for the base HTTP client.
    #[serde(default)]
    pub http_base_config: BaseHttpClientConfig,

    /// Static rendering settings for alerts.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Upper bound on concurrently running event pipelines for a single watch.
    #[serde(default = "default_max_in_flight_per_watch")]
    pub max_in_flight_per_watch: usize,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            rpc_url: default_rpc_url(),
            stream: StreamConfig::default(),
            telegram: TelegramConfig::default(),
            market_data: MarketDataConfig::default(),
            http_base_config: BaseHttpClientConfig::default(),
            notification: NotificationConfig::default(),
            max_in_flight_per_watch: default_max_in_flight_per_watch(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `BUYWATCH__*` environment variables taking precedence.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("BUYWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    /// Sets the database URL.
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    /// Sets the per-watch in-flight limit.
    pub fn max_in_flight_per_watch(mut self, limit: usize) -> Self {
        self.config.max_in_flight_per_watch = limit;
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Builds the `AppConfig`.
    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_builder() {
        let config =
            AppConfig::builder().database_url("sqlite::memory:").max_in_flight_per_watch(4).build();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_in_flight_per_watch, 4);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_app_config_from_file() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        rpc_url: "http://localhost:8545"
        stream:
          api_key: "defined-key"
        telegram:
          bot_token: "123:abc"
        notification:
          price_precision: 8
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.rpc_url.as_str(), "http://localhost:8545/");
        assert_eq!(config.stream.api_key, "defined-key");
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.notification.price_precision, 8);
        assert_eq!(config.max_in_flight_per_watch, 16);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.market_data.chain_id, 1);
    }

    #[test]
    fn test_app_config_missing_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = AppConfig::new(Some(temp_dir.path().to_str().unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn test_app_config_env_var_override() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        unsafe {
            std::env::set_var("BUYWATCH__MAX_IN_FLIGHT_PER_WATCH", "3");
        }

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();
        assert_eq!(config.max_in_flight_per_watch, 3);

        unsafe {
            std::env::remove_var("BUYWATCH__MAX_IN_FLIGHT_PER_WATCH");
        }
    }
}

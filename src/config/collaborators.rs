//! Endpoints and credentials for the external collaborators the core talks to:
//! the realtime trade stream, the Telegram Bot API and the market data
//! providers.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, deserialize_duration_from_seconds, deserialize_url};

fn default_stream_url() -> Url {
    Url::parse("wss://realtime-api.defined.fi/graphql").expect("static url is valid")
}

fn default_network_id() -> u64 {
    1
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_telegram_api_url() -> Url {
    Url::parse("https://api.telegram.org").expect("static url is valid")
}

fn default_honeypot_url() -> Url {
    Url::parse("https://api.honeypot.is").expect("static url is valid")
}

fn default_dextools_url() -> Url {
    Url::parse("https://www.dextools.io").expect("static url is valid")
}

fn default_dextools_chain() -> String {
    "ether".to_string()
}

fn default_dextools_referer() -> String {
    "buywatch".to_string()
}

/// Configuration for the realtime trade event stream (Defined realtime API).
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// GraphQL-over-websocket endpoint.
    #[serde(default = "default_stream_url", deserialize_with = "deserialize_url")]
    pub url: Url,

    /// API key sent in the `connection_init` payload.
    #[serde(default)]
    pub api_key: String,

    /// Network id appended to pair addresses (`<pair>:<network_id>`).
    #[serde(default = "default_network_id")]
    pub network_id: u64,

    /// Maximum time to wait for `connection_ack` after connecting.
    #[serde(
        default = "default_handshake_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub handshake_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            api_key: String::new(),
            network_id: default_network_id(),
            handshake_timeout: default_handshake_timeout(),
        }
    }
}

/// Configuration for the Telegram Bot API delivery sink.
#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// The bot token. Usually supplied through `BUYWATCH__TELEGRAM__BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,

    /// Base URL of the Bot API.
    #[serde(default = "default_telegram_api_url", deserialize_with = "deserialize_url")]
    pub api_url: Url,

    /// Retry policy for Bot API calls.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_telegram_api_url(),
            retry_policy: HttpRetryConfig::default(),
        }
    }
}

/// Configuration for the market data providers used during enrichment.
#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    /// Honeypot.is API, used for asset metadata and holder counts.
    #[serde(default = "default_honeypot_url", deserialize_with = "deserialize_url")]
    pub honeypot_url: Url,

    /// Dextools shared API, used for pair price and market cap.
    #[serde(default = "default_dextools_url", deserialize_with = "deserialize_url")]
    pub dextools_url: Url,

    /// Dextools chain slug.
    #[serde(default = "default_dextools_chain")]
    pub dextools_chain: String,

    /// Value of the `Referer` header Dextools requires.
    #[serde(default = "default_dextools_referer")]
    pub dextools_referer: String,

    /// Chain id passed to Honeypot.is.
    #[serde(default = "default_network_id")]
    pub chain_id: u64,

    /// Retry policy for every market data call.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            honeypot_url: default_honeypot_url(),
            dextools_url: default_dextools_url(),
            dextools_chain: default_dextools_chain(),
            dextools_referer: default_dextools_referer(),
            chain_id: default_network_id(),
            retry_policy: HttpRetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use config::Config;

    use super::*;

    fn from_yaml<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
        Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<T>()
            .unwrap()
    }

    #[test]
    fn test_stream_config_defaults() {
        let config: StreamConfig = from_yaml("api_key: secret");
        assert_eq!(config.url.as_str(), "wss://realtime-api.defined.fi/graphql");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.network_id, 1);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_telegram_config_custom_api_url() {
        let config: TelegramConfig = from_yaml(
            r#"
            bot_token: "123:abc"
            api_url: "http://localhost:8081"
            "#,
        );
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.api_url.as_str(), "http://localhost:8081/");
        assert_eq!(config.retry_policy.max_retries, 0);
    }

    #[test]
    fn test_market_data_config_defaults() {
        let config: MarketDataConfig = from_yaml("chain_id: 56");
        assert_eq!(config.chain_id, 56);
        assert_eq!(config.dextools_chain, "ether");
        assert_eq!(config.honeypot_url.as_str(), "https://api.honeypot.is/");
    }
}

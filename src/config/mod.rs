//! Configuration module for buywatch.

mod app_config;
mod collaborators;
mod helpers;
mod http_base;
mod http_retry;
mod notification;

pub use app_config::AppConfig;
pub use collaborators::{MarketDataConfig, StreamConfig, TelegramConfig};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, deserialize_url,
    serialize_duration_to_ms, serialize_duration_to_seconds,
};
pub use http_base::BaseHttpClientConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use notification::{NotificationConfig, PromoLink};

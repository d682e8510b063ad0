//! Shared outbound HTTP clients for market data providers and the Telegram
//! sink.

mod client;
mod pool;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};

//! Interfaces to the external data sources an alert is enriched with.
//!
//! Every call is a single best-effort request. Callers decide what to do
//! when one fails.

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{
    http_client::HttpClientPoolError,
    models::{HolderStatus, MarketSnapshot},
    persistence::PersistenceError,
};

/// Errors returned by market data providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request could not be sent or the connection failed.
    #[error("Request error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response body could not be read.
    #[error("Response error: {0}")]
    Response(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Unexpected HTTP status {status} from {endpoint}")]
    Status {
        /// Which endpoint answered.
        endpoint: &'static str,
        /// The HTTP status code.
        status: u16,
    },

    /// A required field was absent or had the wrong shape.
    #[error("Missing or malformed field in response: {0}")]
    MissingField(&'static str),

    /// The JSON-RPC node returned an error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
    },

    /// A configured endpoint could not be joined into a URL.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),

    /// The ad store failed.
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Token metadata together with its holder count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Token name.
    pub name: String,
    /// Token ticker.
    pub symbol: String,
    /// Token decimal precision.
    pub decimals: u8,
    /// Number of holders.
    pub holders: u64,
}

/// Token metadata and holder counts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssetInfoProvider: Send + Sync {
    /// Looks up `token`'s metadata and holder count. `pair` scopes the lookup.
    async fn asset_info(&self, token: Address, pair: Address) -> Result<AssetInfo, ProviderError>;
}

/// Wallet balances of a token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Compares `wallet`'s balance of `token` at the latest block with the
    /// block before it.
    async fn balance_change(
        &self,
        wallet: Address,
        token: Address,
        decimals: u8,
    ) -> Result<HolderStatus, ProviderError>;
}

/// Price and market cap of a pair.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PairInfoProvider: Send + Sync {
    /// Current price and FDV of `pair`.
    async fn pair_info(&self, pair: Address) -> Result<MarketSnapshot, ProviderError>;
}

/// The currently running advertisement.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdProvider: Send + Sync {
    /// Text of an ad running at `now`, or `None` when no campaign is live.
    async fn active_ad_text(&self, now: DateTime<Utc>) -> Result<Option<String>, ProviderError>;
}

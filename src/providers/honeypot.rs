//! Token metadata and holder counts from the honeypot.is API.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use url::Url;

use super::{
    json_value::value_to_u64,
    traits::{AssetInfo, AssetInfoProvider, ProviderError},
};

/// Holder count used when the API has no holder analysis for a token.
const DEFAULT_HOLDERS: u64 = 1;

/// Reads token metadata and holder counts from Honeypot.is.
pub struct HoneypotAssetInfoProvider {
    client: Arc<ClientWithMiddleware>,
    base_url: Url,
    chain_id: u64,
}

impl HoneypotAssetInfoProvider {
    /// Creates a provider for the chain with id `chain_id`.
    pub fn new(client: Arc<ClientWithMiddleware>, base_url: Url, chain_id: u64) -> Self {
        Self { client, base_url, chain_id }
    }

    fn request_url(&self, token: Address, pair: Address) -> Result<Url, ProviderError> {
        let mut url = self.base_url.join("v2/IsHoneypot")?;
        url.query_pairs_mut()
            .append_pair("address", &token.to_string().to_lowercase())
            .append_pair("pair", &pair.to_string().to_lowercase())
            .append_pair("chainID", &self.chain_id.to_string());
        Ok(url)
    }
}

#[async_trait]
impl AssetInfoProvider for HoneypotAssetInfoProvider {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn asset_info(&self, token: Address, pair: Address) -> Result<AssetInfo, ProviderError> {
        let url = self.request_url(token, pair)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { endpoint: "honeypot", status: status.as_u16() });
        }
        let body: Value = response.json().await?;

        let token_info = body.get("token").ok_or(ProviderError::MissingField("token"))?;
        let name = token_info
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ProviderError::MissingField("token.name"))?
            .to_string();
        let symbol = token_info
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or(ProviderError::MissingField("token.symbol"))?
            .to_string();
        let decimals = token_info
            .get("decimals")
            .and_then(value_to_u64)
            .and_then(|d| u8::try_from(d).ok())
            .ok_or(ProviderError::MissingField("token.decimals"))?;

        let holders = body
            .get("holderAnalysis")
            .and_then(|analysis| analysis.get("holders"))
            .and_then(value_to_u64)
            .unwrap_or(DEFAULT_HOLDERS);

        tracing::debug!(%token, holders, "Asset info retrieved.");
        Ok(AssetInfo { name, symbol, decimals, holders })
    }
}

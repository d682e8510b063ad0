//! Wallet balance deltas over plain Ethereum JSON-RPC.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};
use url::Url;

use super::traits::{BalanceProvider, ProviderError};
use crate::models::HolderStatus;

/// `balanceOf(address)` selector.
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Reads token balances from a JSON-RPC node.
pub struct JsonRpcBalanceProvider {
    client: Arc<ClientWithMiddleware>,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcBalanceProvider {
    /// Creates a provider for the node at `url`.
    pub fn new(client: Arc<ClientWithMiddleware>, url: Url) -> Self {
        Self { client, url, next_id: AtomicU64::new(1) }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self.client.post(self.url.clone()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { endpoint: "json-rpc", status: status.as_u16() });
        }
        let mut body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            return Err(ProviderError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
            });
        }
        body.get_mut("result").map(Value::take).ok_or(ProviderError::MissingField("result"))
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        result
            .as_str()
            .and_then(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok())
            .ok_or(ProviderError::MissingField("result"))
    }

    async fn balance_at(
        &self,
        wallet: Address,
        token: Address,
        block: u64,
    ) -> Result<U256, ProviderError> {
        let data = format!("0x{BALANCE_OF_SELECTOR}{:0>64}", hex::encode(wallet.as_slice()));
        let result = self
            .call("eth_call", json!([{ "to": token.to_string(), "data": data }, format!("{block:#x}")]))
            .await?;
        let encoded = result.as_str().ok_or(ProviderError::MissingField("result"))?;
        decode_uint(encoded).ok_or(ProviderError::MissingField("result"))
    }
}

fn decode_uint(encoded: &str) -> Option<U256> {
    let bytes = hex::decode(encoded.trim_start_matches("0x")).ok()?;
    if bytes.is_empty() {
        return Some(U256::ZERO);
    }
    U256::try_from_be_slice(&bytes)
}

fn to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::MAX)
}

/// Builds the holder status from the balances around the buy.
///
/// A zero prior balance marks a first-time holder. Otherwise the change is
/// expressed as a percentage of the prior balance.
fn holder_status(current: U256, prior: U256, decimals: u8) -> HolderStatus {
    let balance = to_f64(current) / 10f64.powi(i32::from(decimals));
    if prior.is_zero() {
        return HolderStatus { is_new: true, balance, change_pct: 0.0 };
    }
    let prior = to_f64(prior);
    let change_pct = (to_f64(current) - prior) / prior * 100.0;
    HolderStatus { is_new: false, balance, change_pct }
}

#[async_trait]
impl BalanceProvider for JsonRpcBalanceProvider {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn balance_change(
        &self,
        wallet: Address,
        token: Address,
        decimals: u8,
    ) -> Result<HolderStatus, ProviderError> {
        let latest = self.block_number().await?;
        let current = self.balance_at(wallet, token, latest).await?;
        let prior = self.balance_at(wallet, token, latest.saturating_sub(1)).await?;
        tracing::debug!(%wallet, block = latest, %current, %prior, "Balances fetched.");
        Ok(holder_status(current, prior, decimals))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{config::HttpRetryConfig, http_client::HttpClientPool};

    const WALLET: &str = "0x00000000000000000000000000000000000000b0";
    const TOKEN: &str = "0x00000000000000000000000000000000000000c0";

    fn word(value: u128) -> String {
        format!("0x{:064x}", value)
    }

    async fn provider(server: &mockito::ServerGuard) -> JsonRpcBalanceProvider {
        let client = HttpClientPool::default().get_or_create(&HttpRetryConfig::default()).await.unwrap();
        JsonRpcBalanceProvider::new(client, Url::parse(&server.url()).unwrap())
    }

    async fn mock_block_number(server: &mut mockito::ServerGuard, block: u64) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "eth_blockNumber" })))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": format!("{block:#x}") }).to_string())
            .create_async()
            .await
    }

    async fn mock_balance(server: &mut mockito::ServerGuard, block: u64, balance: u128) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "method": "eth_call" })),
                Matcher::Regex(format!("\"{block:#x}\"")),
            ]))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 2, "result": word(balance) }).to_string())
            .create_async()
            .await
    }

    #[test]
    fn test_holder_status_first_time_holder() {
        let status = holder_status(U256::from(5_000_000_000_000_000_000u128), U256::ZERO, 18);
        assert!(status.is_new);
        assert_eq!(status.balance, 5.0);
        assert_eq!(status.change_pct, 0.0);
    }

    #[test]
    fn test_holder_status_percentage_change() {
        let status = holder_status(U256::from(150u64), U256::from(100u64), 0);
        assert!(!status.is_new);
        assert_eq!(status.balance, 150.0);
        assert_eq!(status.change_pct, 50.0);
    }

    #[test]
    fn test_decode_uint() {
        assert_eq!(decode_uint(&word(255)), Some(U256::from(255u64)));
        assert_eq!(decode_uint("0x"), Some(U256::ZERO));
        assert_eq!(decode_uint("0xzz"), None);
    }

    #[tokio::test]
    async fn test_balance_change_compares_latest_with_previous_block() {
        let mut server = mockito::Server::new_async().await;
        let _block = mock_block_number(&mut server, 100).await;
        let _latest = mock_balance(&mut server, 100, 3_000).await;
        let _previous = mock_balance(&mut server, 99, 1_000).await;

        let status = provider(&server)
            .await
            .balance_change(WALLET.parse().unwrap(), TOKEN.parse().unwrap(), 3)
            .await
            .unwrap();

        assert!(!status.is_new);
        assert_eq!(status.balance, 3.0);
        assert_eq!(status.change_pct, 200.0);
    }

    #[tokio::test]
    async fn test_balance_change_surfaces_rpc_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32000, "message": "header not found" } })
                    .to_string(),
            )
            .create_async()
            .await;

        let result = provider(&server)
            .await
            .balance_change(WALLET.parse().unwrap(), TOKEN.parse().unwrap(), 18)
            .await;

        assert!(matches!(result, Err(ProviderError::Rpc { code: -32000, .. })));
    }
}

//! Live price and fully diluted market cap from Dextools.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use url::Url;

use super::{
    json_value::value_to_decimal,
    traits::{PairInfoProvider, ProviderError},
};
use crate::models::MarketSnapshot;

/// Reads price and FDV of a pair from the Dextools pair endpoint.
pub struct DextoolsPairInfoProvider {
    client: Arc<ClientWithMiddleware>,
    base_url: Url,
    chain: String,
    referer: String,
}

impl DextoolsPairInfoProvider {
    /// Creates a provider for `chain`, sending `referer` with each request.
    pub fn new(
        client: Arc<ClientWithMiddleware>,
        base_url: Url,
        chain: String,
        referer: String,
    ) -> Self {
        Self { client, base_url, chain, referer }
    }
}

#[async_trait]
impl PairInfoProvider for DextoolsPairInfoProvider {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn pair_info(&self, pair: Address) -> Result<MarketSnapshot, ProviderError> {
        let mut url = self.base_url.join("shared/data/pair")?;
        url.query_pairs_mut()
            .append_pair("address", &pair.to_string().to_lowercase())
            .append_pair("chain", &self.chain);

        let response = self.client.get(url).header(REFERER, &self.referer).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { endpoint: "dextools", status: status.as_u16() });
        }
        let body: Value = response.json().await?;

        let entry = body
            .get("data")
            .and_then(|data| data.get(0))
            .ok_or(ProviderError::MissingField("data[0]"))?;
        let price = entry
            .get("price")
            .and_then(value_to_decimal)
            .ok_or(ProviderError::MissingField("data[0].price"))?;
        let market_cap = entry
            .pointer("/token/metrics/fdv")
            .and_then(value_to_decimal)
            .ok_or(ProviderError::MissingField("data[0].token.metrics.fdv"))?;

        Ok(MarketSnapshot { price, market_cap })
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::{config::HttpRetryConfig, http_client::HttpClientPool};

    const PAIR: &str = "0xA478c2975Ab1Ea89e8196811F51A7B7Ade33eB11";

    async fn provider(server: &mockito::ServerGuard) -> DextoolsPairInfoProvider {
        let client = HttpClientPool::default().get_or_create(&HttpRetryConfig::default()).await.unwrap();
        DextoolsPairInfoProvider::new(
            client,
            Url::parse(&server.url()).unwrap(),
            "ether".to_string(),
            "buywatch".to_string(),
        )
    }

    #[tokio::test]
    async fn test_pair_info_reads_price_and_fdv() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/shared/data/pair")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("address".into(), PAIR.to_lowercase()),
                Matcher::UrlEncoded("chain".into(), "ether".into()),
            ]))
            .match_header("referer", "buywatch")
            .with_status(200)
            .with_body(
                json!({
                    "data": [{
                        "price": 0.00012345,
                        "token": { "metrics": { "fdv": 1234567.0 } }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let snapshot = provider(&server).await.pair_info(PAIR.parse().unwrap()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.price, Decimal::new(12345, 8));
        assert_eq!(snapshot.market_cap, Decimal::from(1_234_567));
    }

    #[tokio::test]
    async fn test_pair_info_missing_data_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/shared/data/pair")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "data": [] }).to_string())
            .create_async()
            .await;

        let result = provider(&server).await.pair_info(PAIR.parse().unwrap()).await;
        assert!(matches!(result, Err(ProviderError::MissingField("data[0]"))));
    }
}

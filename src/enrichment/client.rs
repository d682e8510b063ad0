use std::sync::Arc;

use super::error::EnrichmentError;
use crate::{
    models::{
        DegradedField, EnrichedContext, HolderStatus, MarketSnapshot, TradeEvent, Watch,
        parse_address,
    },
    providers::{AssetInfoProvider, BalanceProvider, PairInfoProvider},
};

/// Holder count shown when the lookup fails.
const FALLBACK_HOLDERS: u64 = 1;

/// A stateless façade over the market data providers.
///
/// The three lookups run concurrently and each one degrades independently.
/// Nothing is retried here; a failed lookup is recorded in
/// `EnrichedContext::degraded` and the alert is still rendered.
#[derive(Clone)]
pub struct EnrichmentClient {
    assets: Arc<dyn AssetInfoProvider>,
    balances: Arc<dyn BalanceProvider>,
    pairs: Arc<dyn PairInfoProvider>,
}

impl EnrichmentClient {
    /// Creates a client over the three lookups.
    pub fn new(
        assets: Arc<dyn AssetInfoProvider>,
        balances: Arc<dyn BalanceProvider>,
        pairs: Arc<dyn PairInfoProvider>,
    ) -> Self {
        Self { assets, balances, pairs }
    }

    async fn holders(&self, watch: &Watch) -> Result<u64, EnrichmentError> {
        let info = self.assets.asset_info(watch.asset.address, watch.asset.pair).await?;
        Ok(info.holders)
    }

    async fn holder_status(
        &self,
        event: &TradeEvent,
        watch: &Watch,
    ) -> Result<HolderStatus, EnrichmentError> {
        let wallet = parse_address(&event.maker)
            .map_err(|_| EnrichmentError::InvalidMaker(event.maker.clone()))?;
        let status =
            self.balances.balance_change(wallet, watch.asset.address, watch.asset.decimals).await?;
        Ok(status)
    }

    async fn market(&self, watch: &Watch) -> Result<MarketSnapshot, EnrichmentError> {
        Ok(self.pairs.pair_info(watch.asset.pair).await?)
    }

    /// Builds the enriched context for one admitted event.
    #[tracing::instrument(skip_all, fields(watch_id = ?watch.id, tx_hash = %event.tx_hash))]
    pub async fn enrich(&self, event: &TradeEvent, watch: &Watch) -> EnrichedContext {
        let (holders, holder, market) =
            tokio::join!(self.holders(watch), self.holder_status(event, watch), self.market(watch));

        let mut degraded = Vec::new();

        let holders = holders.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Holder count lookup failed, using fallback.");
            degraded.push(DegradedField::Holders);
            FALLBACK_HOLDERS
        });
        let holder = holder
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Balance lookup failed.");
                degraded.push(DegradedField::Balance);
            })
            .ok();
        let market = market
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Price lookup failed.");
                degraded.push(DegradedField::Market);
            })
            .ok();

        if !degraded.is_empty() {
            tracing::warn!(?degraded, "Alert will be rendered with degraded fields.");
        }

        EnrichedContext { holders, holder, market, degraded }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        providers::{
            AssetInfo, ProviderError,
            traits::{MockAssetInfoProvider, MockBalanceProvider, MockPairInfoProvider},
        },
        test_helpers::{TradeEventBuilder, WatchBuilder},
    };

    fn asset_ok(holders: u64) -> MockAssetInfoProvider {
        let mut mock = MockAssetInfoProvider::new();
        mock.expect_asset_info().returning(move |_, _| {
            Ok(AssetInfo {
                name: "Token".to_string(),
                symbol: "TKN".to_string(),
                decimals: 18,
                holders,
            })
        });
        mock
    }

    fn balance_ok() -> MockBalanceProvider {
        let mut mock = MockBalanceProvider::new();
        mock.expect_balance_change().returning(|_, _, _| {
            Ok(HolderStatus { is_new: true, balance: 42.0, change_pct: 0.0 })
        });
        mock
    }

    fn pair_ok() -> MockPairInfoProvider {
        let mut mock = MockPairInfoProvider::new();
        mock.expect_pair_info().returning(|_| {
            Ok(MarketSnapshot { price: Decimal::new(5, 4), market_cap: Decimal::from(1_000_000) })
        });
        mock
    }

    fn failing_pair() -> MockPairInfoProvider {
        let mut mock = MockPairInfoProvider::new();
        mock.expect_pair_info()
            .returning(|_| Err(ProviderError::Status { endpoint: "dextools", status: 500 }));
        mock
    }

    #[tokio::test]
    async fn test_enrich_collects_all_lookups() {
        let client =
            EnrichmentClient::new(Arc::new(asset_ok(250)), Arc::new(balance_ok()), Arc::new(pair_ok()));
        let context =
            client.enrich(&TradeEventBuilder::new().build(), &WatchBuilder::new().build()).await;

        assert_eq!(context.holders, 250);
        assert!(context.holder.as_ref().unwrap().is_new);
        assert_eq!(context.market.unwrap().market_cap, Decimal::from(1_000_000));
        assert!(context.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_falls_back_to_one_holder() {
        let mut assets = MockAssetInfoProvider::new();
        assets
            .expect_asset_info()
            .returning(|_, _| Err(ProviderError::MissingField("token")));

        let client =
            EnrichmentClient::new(Arc::new(assets), Arc::new(balance_ok()), Arc::new(pair_ok()));
        let context =
            client.enrich(&TradeEventBuilder::new().build(), &WatchBuilder::new().build()).await;

        assert_eq!(context.holders, 1);
        assert_eq!(context.degraded, vec![DegradedField::Holders]);
    }

    #[tokio::test]
    async fn test_enrich_marks_market_as_degraded() {
        let client =
            EnrichmentClient::new(Arc::new(asset_ok(3)), Arc::new(balance_ok()), Arc::new(failing_pair()));
        let context =
            client.enrich(&TradeEventBuilder::new().build(), &WatchBuilder::new().build()).await;

        assert!(context.market.is_none());
        assert_eq!(context.degraded, vec![DegradedField::Market]);
        assert!(context.is_degraded());
    }

    #[tokio::test]
    async fn test_enrich_skips_balance_for_invalid_maker() {
        let mut balances = MockBalanceProvider::new();
        balances.expect_balance_change().never();

        let client =
            EnrichmentClient::new(Arc::new(asset_ok(3)), Arc::new(balances), Arc::new(pair_ok()));
        let event = TradeEventBuilder::new().maker("not-an-address").build();
        let context = client.enrich(&event, &WatchBuilder::new().build()).await;

        assert!(context.holder.is_none());
        assert_eq!(context.degraded, vec![DegradedField::Balance]);
    }
}

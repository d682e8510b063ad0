//! Fixed-answer market data providers that count their calls.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    models::{HolderStatus, MarketSnapshot},
    providers::{
        AdProvider, AssetInfo, AssetInfoProvider, BalanceProvider, PairInfoProvider,
        ProviderError,
    },
};

/// Answers every lookup with the same healthy values.
///
/// [`StaticMarketData::delay_balance_for`] slows down the balance lookup of
/// one wallet, which holds back enrichment of that buyer's events.
#[derive(Default)]
pub struct StaticMarketData {
    calls: AtomicUsize,
    balance_delays: HashMap<Address, Duration>,
}

impl StaticMarketData {
    /// A provider with no delays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays balance lookups for `wallet` by `delay`.
    pub fn delay_balance_for(mut self, wallet: Address, delay: Duration) -> Self {
        self.balance_delays.insert(wallet, delay);
        self
    }

    /// Total calls across all three lookups.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetInfoProvider for StaticMarketData {
    async fn asset_info(&self, _token: Address, _pair: Address) -> Result<AssetInfo, ProviderError> {
        self.record();
        Ok(AssetInfo {
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            decimals: 18,
            holders: 1234,
        })
    }
}

#[async_trait]
impl BalanceProvider for StaticMarketData {
    async fn balance_change(
        &self,
        wallet: Address,
        _token: Address,
        _decimals: u8,
    ) -> Result<HolderStatus, ProviderError> {
        if let Some(delay) = self.balance_delays.get(&wallet) {
            tokio::time::sleep(*delay).await;
        }
        self.record();
        Ok(HolderStatus { is_new: true, balance: 1500.5, change_pct: 0.0 })
    }
}

#[async_trait]
impl PairInfoProvider for StaticMarketData {
    async fn pair_info(&self, _pair: Address) -> Result<MarketSnapshot, ProviderError> {
        self.record();
        Ok(MarketSnapshot {
            price: Decimal::new(123, 6),
            market_cap: Decimal::from(1_234_567),
        })
    }
}

/// Always returns the same ad text.
#[derive(Default)]
pub struct StaticAdProvider {
    text: Option<String>,
    calls: AtomicUsize,
}

impl StaticAdProvider {
    /// A provider that always answers with `text`.
    pub fn new(text: Option<&str>) -> Self {
        Self { text: text.map(str::to_string), calls: AtomicUsize::new(0) }
    }

    /// Number of ad lookups so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdProvider for StaticAdProvider {
    async fn active_ad_text(&self, _now: DateTime<Utc>) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

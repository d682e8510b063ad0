//! Per-event market data gathered before an alert is rendered.

use rust_decimal::Decimal;
use serde::Serialize;

/// A lookup that failed and was replaced by a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedField {
    /// The holder count lookup.
    Holders,
    /// The buyer balance lookup.
    Balance,
    /// The price and market cap lookup.
    Market,
}

/// The buyer's position after the trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderStatus {
    /// True when the buyer held nothing one block before the latest.
    pub is_new: bool,
    /// Balance after the trade, scaled by the token's decimals.
    pub balance: f64,
    /// Percentage change of the raw balance. Zero for new holders.
    pub change_pct: f64,
}

/// Price and fully diluted market cap of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    /// Token price in USD.
    pub price: Decimal,
    /// Fully diluted valuation in USD.
    pub market_cap: Decimal,
}

/// Everything the formatter needs beyond the event and the watch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedContext {
    /// Number of token holders. One when the lookup failed.
    pub holders: u64,
    /// The buyer's position, if the balance lookup succeeded.
    pub holder: Option<HolderStatus>,
    /// Price and market cap, if the pair lookup succeeded.
    pub market: Option<MarketSnapshot>,
    /// Lookups that fell back to defaults.
    pub degraded: Vec<DegradedField>,
}

impl EnrichedContext {
    /// Whether any lookup fell back.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

impl Default for EnrichedContext {
    fn default() -> Self {
        Self { holders: 1, holder: None, market: None, degraded: Vec::new() }
    }
}

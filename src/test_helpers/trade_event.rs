//! A builder for creating `TradeEvent` instances in tests.

use rust_decimal::Decimal;

use crate::models::{TradeEvent, TradeKind};

/// A builder for creating `TradeEvent` instances in tests.
///
/// Defaults to a $250 buy from a well-formed wallet address.
pub struct TradeEventBuilder {
    event: TradeEvent,
}

impl Default for TradeEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeEventBuilder {
    /// Creates a builder for a healthy buy.
    pub fn new() -> Self {
        Self {
            event: TradeEvent {
                kind: TradeKind::Buy,
                maker: "0x1111111111111111111111111111111111111111".to_string(),
                tx_hash: "0xabc123".to_string(),
                amount0_out: Some("0".to_string()),
                amount1_out: Some("1000000000000000000000".to_string()),
                base_total: Decimal::new(8, 2),
                usd_total: Decimal::from(250),
            },
        }
    }

    /// Sets the trade direction.
    pub fn kind(mut self, kind: TradeKind) -> Self {
        self.event.kind = kind;
        self
    }

    /// Sets the buyer wallet.
    pub fn maker(mut self, maker: &str) -> Self {
        self.event.maker = maker.to_string();
        self
    }

    /// Sets the transaction hash.
    pub fn tx_hash(mut self, tx_hash: &str) -> Self {
        self.event.tx_hash = tx_hash.to_string();
        self
    }

    /// Sets the USD value.
    pub fn usd_total(mut self, usd_total: Decimal) -> Self {
        self.event.usd_total = usd_total;
        self
    }

    /// Sets the ETH value.
    pub fn base_total(mut self, base_total: Decimal) -> Self {
        self.event.base_total = base_total;
        self
    }

    /// Builds the `TradeEvent`.
    pub fn build(self) -> TradeEvent {
        self.event
    }
}

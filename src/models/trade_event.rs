//! Trade events as received from the realtime stream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The direction of a swap, from the point of view of the watched token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// The watched token was bought.
    Buy,
    /// The watched token was sold.
    Sell,
    /// Liquidity changes and anything else.
    Other,
}

impl TradeKind {
    /// Maps the upstream `eventDisplayType` label.
    pub fn from_display_type(label: &str) -> Self {
        match label {
            "Buy" => TradeKind::Buy,
            "Sell" => TradeKind::Sell,
            _ => TradeKind::Other,
        }
    }
}

/// A single swap on a watched pair. Consumed once and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Direction of the swap.
    pub kind: TradeKind,
    /// Wallet that initiated the swap.
    pub maker: String,
    /// Hash of the transaction that carried the swap.
    pub tx_hash: String,
    /// Raw amount of token 0 sent out, if reported.
    pub amount0_out: Option<String>,
    /// Raw amount of token 1 sent out, if reported.
    pub amount1_out: Option<String>,
    /// Value of the swap in the pair's base token (ETH).
    pub base_total: Decimal,
    /// Value of the swap in USD.
    pub usd_total: Decimal,
}

//! A `Watch` ties one monitored trading pair to one destination channel.

use std::{fmt, str::FromStr};

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trade_event::{TradeEvent, TradeKind};

/// Identifier assigned to a watch once it has been persisted.
pub type WatchId = i64;

/// Identifier of the user that configured a watch.
pub type OwnerId = i64;

/// Identifier of the chat a watch posts alerts into.
pub type ChannelId = i64;

/// An owner may hold at most this many watches at once.
pub const MAX_WATCHES_PER_OWNER: usize = 3;

/// The charting site linked from every alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartProvider {
    /// geckoterminal.com
    Geckoterminal,
    /// dextools.io
    #[default]
    Dextools,
    /// dexscreener.com
    Dexscreener,
    /// coinscan.com
    Coinscan,
}

impl ChartProvider {
    /// Base URL the pair address is appended to.
    pub fn base_url(&self) -> &'static str {
        match self {
            ChartProvider::Geckoterminal => "https://www.geckoterminal.com/es/eth/pools/",
            ChartProvider::Dextools => "https://www.dextools.io/app/es/ether/pair-explorer/",
            ChartProvider::Dexscreener => "https://dexscreener.com/ethereum/",
            ChartProvider::Coinscan => "https://www.coinscan.com/es/tokens/eth/",
        }
    }

    /// Full chart URL for `pair`.
    pub fn chart_url(&self, pair: &Address) -> String {
        format!("{}{}", self.base_url(), pair)
    }

    /// Name used in configuration and on the chart button.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartProvider::Geckoterminal => "Geckoterminal",
            ChartProvider::Dextools => "Dextools",
            ChartProvider::Dexscreener => "Dexscreener",
            ChartProvider::Coinscan => "Coinscan",
        }
    }
}

impl fmt::Display for ChartProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a chart provider name is not one of the supported sites.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown chart provider: {0}")]
pub struct UnknownChartProvider(pub String);

impl FromStr for ChartProvider {
    type Err = UnknownChartProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Geckoterminal" => Ok(ChartProvider::Geckoterminal),
            "Dextools" => Ok(ChartProvider::Dextools),
            "Dexscreener" => Ok(ChartProvider::Dexscreener),
            "Coinscan" => Ok(ChartProvider::Coinscan),
            other => Err(UnknownChartProvider(other.to_string())),
        }
    }
}

/// The token being watched and the pool its trades happen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentity {
    /// Token contract address.
    pub address: Address,
    /// Trading pair (liquidity pool) address.
    pub pair: Address,
    /// Token name.
    pub name: String,
    /// Token ticker.
    pub symbol: String,
    /// Token decimal precision, used to scale raw balances.
    pub decimals: u8,
}

/// Optional image attached to large buys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Whether the image is sent at all.
    pub enabled: bool,
    /// A Telegram file id or a public image URL.
    pub image: String,
    /// Minimum USD value for the image to be sent.
    pub threshold: Decimal,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self { enabled: false, image: String::new(), threshold: Decimal::from(100) }
    }
}

/// Project links rendered under each alert. Empty links are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    /// Telegram group link.
    pub telegram: Option<String>,
    /// Project website.
    pub website: Option<String>,
    /// Twitter profile.
    pub twitter: Option<String>,
}

/// One monitored asset pair inside one destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    /// Present only once the watch has been persisted.
    pub id: Option<WatchId>,
    /// User who configured the watch.
    pub owner_id: OwnerId,
    /// Telegram channel the alerts go to.
    pub channel_id: ChannelId,
    /// The watched token and pair.
    pub asset: AssetIdentity,
    /// Minimum USD value of a buy for it to be announced.
    pub min_buy: Decimal,
    /// USD value represented by one emoji in the alert bar.
    pub step: Decimal,
    /// Emoji repeated in the alert bar.
    pub emoji: String,
    /// Charting site linked from each alert.
    pub chart: ChartProvider,
    /// Paused watches are kept but never subscribed.
    pub paused: bool,
    /// Image rules for large buys.
    pub media: Option<MediaSettings>,
    /// Project links shown under each alert.
    pub social: SocialLinks,
}

impl Watch {
    /// Creates an unsaved watch with the default alert settings.
    pub fn new(owner_id: OwnerId, channel_id: ChannelId, asset: AssetIdentity) -> Self {
        Self {
            id: None,
            owner_id,
            channel_id,
            asset,
            min_buy: Decimal::ONE,
            step: Decimal::from(50),
            emoji: "🚀".to_string(),
            chart: ChartProvider::default(),
            paused: false,
            media: None,
            social: SocialLinks::default(),
        }
    }

    /// The admission filter: only buys worth at least `min_buy` USD pass.
    pub fn admits(&self, event: &TradeEvent) -> bool {
        event.kind == TradeKind::Buy && event.usd_total >= self.min_buy
    }

    /// Returns the image to attach for a buy of `usd`, if any.
    pub fn media_for(&self, usd: Decimal) -> Option<&str> {
        match &self.media {
            Some(media) if media.enabled && usd >= media.threshold => Some(media.image.as_str()),
            _ => None,
        }
    }
}

/// Parses a `0x`-prefixed, 40 hex character address.
///
/// Bare hex without the prefix is rejected even though `Address` itself would
/// accept it.
pub fn parse_address(input: &str) -> Result<Address, InvalidAddress> {
    let trimmed = input.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(InvalidAddress(input.to_string()));
    }
    trimmed.parse::<Address>().map_err(|_| InvalidAddress(input.to_string()))
}

/// Returned when a token or pair address is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid address: {0}")]
pub struct InvalidAddress(pub String);

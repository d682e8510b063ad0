use std::path::PathBuf;

use serde::Deserialize;

fn default_explorer_url() -> String {
    "https://etherscan.io".to_string()
}

fn default_dex_url() -> String {
    "https://app.uniswap.org/#/tokens/ethereum/".to_string()
}

fn default_dex_label() -> String {
    "UniSwap".to_string()
}

fn default_price_precision() -> usize {
    15
}

/// An extra link appended to every alert (e.g. the bot's own channel).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PromoLink {
    /// Link text.
    pub label: String,
    /// Link target.
    pub url: String,
}

/// Static rendering settings shared by every watch.
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Block explorer base URL used for buyer and transaction links.
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    /// DEX URL prefix; the token address is appended.
    #[serde(default = "default_dex_url")]
    pub dex_url: String,

    /// Text of the DEX link.
    #[serde(default = "default_dex_label")]
    pub dex_label: String,

    /// Optional promotional link rendered after the chart and DEX links.
    #[serde(default)]
    pub promo: Option<PromoLink>,

    /// Number of decimals used when rendering the token price.
    #[serde(default = "default_price_precision")]
    pub price_precision: usize,

    /// Optional path to a custom minijinja template replacing the built-in
    /// alert layout.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            explorer_url: default_explorer_url(),
            dex_url: default_dex_url(),
            dex_label: default_dex_label(),
            promo: None,
            price_precision: default_price_precision(),
            template_path: None,
        }
    }
}

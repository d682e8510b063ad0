//! A builder for creating `Watch` instances in tests.

use rust_decimal::Decimal;

use crate::models::{
    AssetIdentity, ChannelId, ChartProvider, MediaSettings, OwnerId, SocialLinks, Watch, WatchId,
};

/// Token address used when none is set.
pub const DEFAULT_TOKEN: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";
/// Pair address used when none is set.
pub const DEFAULT_PAIR: &str = "0xa43fe16908251ee70ef74718545e4fe6c5ccec9f";

/// A builder for creating `Watch` instances in tests.
pub struct WatchBuilder {
    watch: Watch,
}

impl Default for WatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBuilder {
    /// Creates a builder for an unsaved watch owned by owner `1` in channel
    /// `-1001`.
    pub fn new() -> Self {
        let asset = AssetIdentity {
            address: DEFAULT_TOKEN.parse().expect("valid default token"),
            pair: DEFAULT_PAIR.parse().expect("valid default pair"),
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            decimals: 18,
        };
        Self { watch: Watch::new(1, -1001, asset) }
    }

    /// Sets the watch id.
    pub fn id(mut self, id: WatchId) -> Self {
        self.watch.id = Some(id);
        self
    }

    /// Sets the owner.
    pub fn owner(mut self, owner_id: OwnerId) -> Self {
        self.watch.owner_id = owner_id;
        self
    }

    /// Sets the destination channel.
    pub fn channel(mut self, channel_id: ChannelId) -> Self {
        self.watch.channel_id = channel_id;
        self
    }

    /// Sets the token name.
    pub fn name(mut self, name: &str) -> Self {
        self.watch.asset.name = name.to_string();
        self
    }

    /// Sets the token symbol.
    pub fn symbol(mut self, symbol: &str) -> Self {
        self.watch.asset.symbol = symbol.to_string();
        self
    }

    /// Sets the token decimals.
    pub fn decimals(mut self, decimals: u8) -> Self {
        self.watch.asset.decimals = decimals;
        self
    }

    /// Sets the token address.
    pub fn address(mut self, address: &str) -> Self {
        self.watch.asset.address = address.parse().expect("valid token address");
        self
    }

    /// Sets the pair address.
    pub fn pair(mut self, pair: &str) -> Self {
        self.watch.asset.pair = pair.parse().expect("valid pair address");
        self
    }

    /// Sets the minimum USD value of an announced buy.
    pub fn min_buy(mut self, min_buy: Decimal) -> Self {
        self.watch.min_buy = min_buy;
        self
    }

    /// Sets the USD value per emoji.
    pub fn step(mut self, step: Decimal) -> Self {
        self.watch.step = step;
        self
    }

    /// Sets the emoji.
    pub fn emoji(mut self, emoji: &str) -> Self {
        self.watch.emoji = emoji.to_string();
        self
    }

    /// Sets the chart provider.
    pub fn chart(mut self, chart: ChartProvider) -> Self {
        self.watch.chart = chart;
        self
    }

    /// Sets the media settings.
    pub fn media(mut self, media: MediaSettings) -> Self {
        self.watch.media = Some(media);
        self
    }

    /// Sets the social links.
    pub fn social(mut self, social: SocialLinks) -> Self {
        self.watch.social = social;
        self
    }

    /// Sets the paused flag.
    pub fn paused(mut self, paused: bool) -> Self {
        self.watch.paused = paused;
        self
    }

    /// Builds the `Watch`.
    pub fn build(self) -> Watch {
        self.watch
    }
}

//! Data models shared by the registry, the pipeline and persistence.

pub mod advertisement;
pub mod enriched;
pub mod owner;
pub mod trade_event;
pub mod watch;

pub use advertisement::Advertisement;
pub use enriched::{DegradedField, EnrichedContext, HolderStatus, MarketSnapshot};
pub use owner::Owner;
pub use trade_event::{TradeEvent, TradeKind};
pub use watch::{
    AssetIdentity, ChannelId, ChartProvider, InvalidAddress, MAX_WATCHES_PER_OWNER, MediaSettings,
    OwnerId, SocialLinks, UnknownChartProvider, Watch, WatchId, parse_address,
};

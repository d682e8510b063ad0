//! A set of helpers for testing

mod market_data;
mod sink;
mod store;
mod stream;
mod trade_event;
mod watch;

pub use market_data::{StaticAdProvider, StaticMarketData};
pub use sink::RecordingSink;
pub use store::InMemoryStore;
pub use stream::ScriptedStreamProvider;
pub use trade_event::TradeEventBuilder;
pub use watch::WatchBuilder;

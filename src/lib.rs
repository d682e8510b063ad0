#![warn(missing_docs)]
//! Buywatch posts buy alerts for watched trading pairs into Telegram
//! channels, enriched with live holder and market data.

pub mod cmd;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod enrichment;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod providers;
pub mod stream;
pub mod supervisor;
pub mod test_helpers;

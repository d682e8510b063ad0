//! Gathers live market data for an admitted trade event.

mod client;
mod error;

pub use client::EnrichmentClient;
pub use error::EnrichmentError;

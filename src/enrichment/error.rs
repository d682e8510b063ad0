use thiserror::Error;

use crate::providers::ProviderError;

/// Why a single enrichment lookup produced no value.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The event's maker is not a valid address, so no balance can be read.
    #[error("Invalid maker address: {0}")]
    InvalidMaker(String),

    /// A lookup failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

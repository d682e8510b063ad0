//! Error types for alert formatting.

use thiserror::Error;

use crate::notification::template::TemplateServiceError;

/// Errors raised while turning an enriched event into an alert.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A custom template file could not be read.
    #[error("Failed to load template {path}: {source}")]
    TemplateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An error related to the template rendering process.
    #[error("Template rendering error: {0}")]
    TemplateError(#[from] TemplateServiceError),
}

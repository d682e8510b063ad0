use thiserror::Error;

/// Outcome classes of a failed delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel rejected the bot (kicked, blocked or lost rights). The
    /// watch posting into it must be torn down.
    #[error("Channel permanently unreachable: {0}")]
    PermanentlyUnreachable(String),

    /// Anything else. The alert is dropped without retry.
    #[error("Transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    /// Whether the destination will never accept messages again.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::PermanentlyUnreachable(_))
    }
}

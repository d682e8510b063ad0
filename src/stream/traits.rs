use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::TradeEvent;

/// Errors raised while opening or reading a stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The connection could not be established.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// The server did not acknowledge the connection in time.
    #[error("Timed out waiting for the stream handshake")]
    Timeout,

    /// The server sent something outside the subscription protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The websocket failed mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server reported an error for the subscription.
    #[error("Server error: {0}")]
    Server(String),
}

/// What a stream pushes to its reader.
#[derive(Debug)]
pub enum StreamItem {
    /// A batch of events, in upstream order.
    Events(Vec<TradeEvent>),
    /// The stream failed. No further items follow.
    Error(StreamError),
}

/// A live subscription to one pair's trade events.
///
/// The stream has completed once `events` yields `None`. Cancelling `cancel`
/// asks the producer to unsubscribe and stop; it may be cancelled any number
/// of times.
pub struct EventStream {
    /// Event batches in upstream order. `None` once the stream ended.
    pub events: mpsc::Receiver<StreamItem>,
    /// Cancels the subscription.
    pub cancel: CancellationToken,
}

/// A push source of trade events.
#[async_trait]
pub trait EventStreamProvider: Send + Sync {
    /// Opens a subscription scoped to `pair`. Resolves once the upstream has
    /// accepted the subscription.
    async fn subscribe(&self, pair: Address) -> Result<EventStream, StreamError>;
}

//! Realtime trade event streams, one per watched pair.

mod defined;
mod traits;

pub use defined::DefinedStreamProvider;
pub use traits::{EventStream, EventStreamProvider, StreamError, StreamItem};

//! Storage of watch configuration, owners and advertisements.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteStore;
pub use traits::{AdRepository, OwnerRepository, WatchRepository};

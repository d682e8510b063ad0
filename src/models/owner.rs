//! Owners and the watches they hold.

use serde::{Deserialize, Serialize};

use super::watch::{OwnerId, WatchId};

/// A user together with the ids of the watches they configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Telegram user id.
    pub id: OwnerId,
    pub username: Option<String>,
    /// Ids of the watches this owner holds.
    pub watch_ids: Vec<WatchId>,
}

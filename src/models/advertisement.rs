//! Advertisements appended to alerts while their campaign is running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A paid message shown under alerts during its campaign window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Store id.
    pub id: i64,
    /// Name of the advertised token.
    pub token_name: String,
    /// Text rendered in the ad block.
    pub text: String,
    /// Start of the campaign.
    pub start_time: Option<DateTime<Utc>>,
    /// End of the campaign.
    pub end_time: Option<DateTime<Utc>>,
    /// Manual on/off switch.
    pub is_active: bool,
}

impl Advertisement {
    /// An ad runs when it is switched on and `now` is inside its window.
    /// Both bounds are inclusive and a missing bound never matches.
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => self.is_active && start <= now && now <= end,
            _ => false,
        }
    }
}

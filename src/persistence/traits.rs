//! Storage interfaces consumed by the watch lifecycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use super::error::PersistenceError;
use crate::models::{Advertisement, Owner, OwnerId, Watch, WatchId};

/// Persisted watch configuration.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WatchRepository: Send + Sync {
    /// Returns every watch created by `owner_id`, oldest first.
    async fn find_watches_for_owner(&self, owner_id: OwnerId)
    -> Result<Vec<Watch>, PersistenceError>;

    /// Persists a new watch and returns it with its assigned id.
    async fn create_watch(&self, watch: &Watch) -> Result<Watch, PersistenceError>;

    /// Deletes a watch. Returns `false` when no such watch existed.
    async fn delete_watch(&self, id: WatchId) -> Result<bool, PersistenceError>;

    /// Returns the watch with `id`, if stored.
    async fn find_watch(&self, id: WatchId) -> Result<Option<Watch>, PersistenceError>;

    /// Sets the paused flag. Fails with `NotFound` for an unknown id.
    async fn set_paused(&self, id: WatchId, paused: bool) -> Result<(), PersistenceError>;
}

/// Owners and the set of watch ids each one holds.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OwnerRepository: Send + Sync {
    /// Returns every owner with their linked watch ids.
    async fn list_owners(&self) -> Result<Vec<Owner>, PersistenceError>;

    /// Watch ids linked to `owner_id`.
    async fn watch_ids_for_owner(&self, owner_id: OwnerId)
    -> Result<Vec<WatchId>, PersistenceError>;

    /// The owner linked to `watch_id`, if any.
    async fn find_owner_of_watch(
        &self,
        watch_id: WatchId,
    ) -> Result<Option<OwnerId>, PersistenceError>;

    /// Links a watch to its owner, creating the owner if needed.
    ///
    /// Fails with `CapacityReached` when the owner already holds
    /// `MAX_WATCHES_PER_OWNER` ids.
    async fn add_watch_to_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<(), PersistenceError>;

    /// Unlinks a watch. Returns `false` when the link did not exist.
    async fn remove_watch_from_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<bool, PersistenceError>;

    /// Creates the owner or updates their username.
    async fn upsert_owner(
        &self,
        owner_id: OwnerId,
        username: Option<String>,
    ) -> Result<(), PersistenceError>;
}

/// Read access to advertisements, plus creation for seeding campaigns.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdRepository: Send + Sync {
    /// Returns the ads that are switched on and whose window contains `now`.
    async fn running_ads(&self, now: DateTime<Utc>)
    -> Result<Vec<Advertisement>, PersistenceError>;

    /// Persists an ad and returns its id.
    async fn create_ad(&self, ad: &Advertisement) -> Result<i64, PersistenceError>;
}

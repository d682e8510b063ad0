//! In-memory index of the subscriptions that are running right now.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::models::{MAX_WATCHES_PER_OWNER, OwnerId, Watch, WatchId};

/// Errors returned by [`WatchRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An entry for this watch already exists.
    #[error("Watch {0} is already registered")]
    DuplicateWatch(WatchId),

    /// The owner already holds `MAX_WATCHES_PER_OWNER` live entries.
    #[error("Owner {owner_id} already has the maximum number of live watches")]
    CapacityReached {
        /// The owner at capacity.
        owner_id: OwnerId,
    },

    /// No entry exists for this watch.
    #[error("Watch {0} is not registered")]
    NotFound(WatchId),

    /// Only persisted watches carry an id and can be registered.
    #[error("Watch has not been persisted")]
    Unpersisted,
}

/// The live link between a watch and its event stream.
///
/// Clones share the same cancellation token, so cancelling any clone stops
/// the stream. Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    watch: Watch,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Pairs a watch with the token that cancels its stream.
    pub fn new(watch: Watch, cancel: CancellationToken) -> Self {
        Self { watch, cancel }
    }

    /// The watch configuration the subscription was started with.
    pub fn watch(&self) -> &Watch {
        &self.watch
    }

    /// Cancels the stream. Later calls do nothing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<WatchId, SubscriptionHandle>,
    by_owner: HashMap<OwnerId, HashSet<WatchId>>,
}

impl Inner {
    fn remove(&mut self, id: WatchId) -> Option<SubscriptionHandle> {
        let handle = self.by_id.remove(&id)?;
        let owner_id = handle.watch.owner_id;
        if let Some(ids) = self.by_owner.get_mut(&owner_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_owner.remove(&owner_id);
            }
        }
        Some(handle)
    }
}

/// Maps watch ids to their running subscription.
///
/// Both indexes live behind one lock, so a reader never sees an entry in one
/// index and not the other. The registry is never persisted.
#[derive(Default)]
pub struct WatchRegistry {
    inner: RwLock<Inner>,
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` under its watch id and owner.
    pub async fn register(&self, handle: SubscriptionHandle) -> Result<(), RegistryError> {
        let id = handle.watch.id.ok_or(RegistryError::Unpersisted)?;
        let owner_id = handle.watch.owner_id;

        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&id) {
            return Err(RegistryError::DuplicateWatch(id));
        }
        let owned = inner.by_owner.get(&owner_id).map_or(0, HashSet::len);
        if owned >= MAX_WATCHES_PER_OWNER {
            return Err(RegistryError::CapacityReached { owner_id });
        }

        inner.by_owner.entry(owner_id).or_default().insert(id);
        inner.by_id.insert(id, handle);
        Ok(())
    }

    /// Removes and returns the entry for `id`.
    ///
    /// When several callers race to revoke the same id exactly one gets the
    /// handle and the rest get `NotFound`.
    pub async fn revoke(&self, id: WatchId) -> Result<SubscriptionHandle, RegistryError> {
        self.inner.write().await.remove(id).ok_or(RegistryError::NotFound(id))
    }

    /// Removes the entry for `id` only if its subscription was already
    /// cancelled. A live entry registered by someone else is left alone.
    pub async fn revoke_cancelled(&self, id: WatchId) -> Option<SubscriptionHandle> {
        let mut inner = self.inner.write().await;
        if inner.by_id.get(&id).is_some_and(SubscriptionHandle::is_cancelled) {
            inner.remove(id)
        } else {
            None
        }
    }

    /// Returns a clone of the entry for `id`.
    pub async fn lookup(&self, id: WatchId) -> Option<SubscriptionHandle> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    /// Number of live entries held by `owner_id`.
    pub async fn owner_count(&self, owner_id: OwnerId) -> usize {
        self.inner.read().await.by_owner.get(&owner_id).map_or(0, HashSet::len)
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    /// Whether the registry holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every entry, returning the handles.
    pub async fn drain(&self) -> Vec<SubscriptionHandle> {
        let mut inner = self.inner.write().await;
        inner.by_owner.clear();
        inner.by_id.drain().map(|(_, handle)| handle).collect()
    }
}

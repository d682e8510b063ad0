//! An in-memory watch and owner store that counts mutations.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    models::{MAX_WATCHES_PER_OWNER, Owner, OwnerId, Watch, WatchId},
    persistence::{OwnerRepository, PersistenceError, WatchRepository},
};

#[derive(Default)]
struct Tables {
    watches: BTreeMap<WatchId, Watch>,
    owners: BTreeMap<OwnerId, Owner>,
    unreadable: BTreeSet<WatchId>,
    next_id: WatchId,
}

/// Implements both storage traits over plain maps.
///
/// Every call that writes, successful or not, bumps `mutations`.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    mutations: AtomicUsize,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `find_watch` fail for `id`, as if its row were corrupt.
    pub fn fail_reads_of(&self, id: WatchId) {
        self.lock().unreadable.insert(id);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of write calls so far, seeding excluded.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Persists `watch` and links it to its owner without counting the
    /// writes. Returns the stored watch.
    pub fn seed(&self, watch: Watch) -> Watch {
        let mut tables = self.lock();
        let id = watch.id.unwrap_or(tables.next_id + 1);
        tables.next_id = tables.next_id.max(id);
        let stored = Watch { id: Some(id), ..watch };
        tables.watches.insert(id, stored.clone());
        tables
            .owners
            .entry(stored.owner_id)
            .or_insert_with(|| Owner { id: stored.owner_id, username: None, watch_ids: vec![] })
            .watch_ids
            .push(id);
        stored
    }

    /// Links `watch_id` to `owner_id` without a stored watch behind it.
    pub fn seed_dangling_link(&self, owner_id: OwnerId, watch_id: WatchId) {
        self.lock()
            .owners
            .entry(owner_id)
            .or_insert_with(|| Owner { id: owner_id, username: None, watch_ids: vec![] })
            .watch_ids
            .push(watch_id);
    }

    /// The stored watch with `id`, if any.
    pub fn stored_watch(&self, id: WatchId) -> Option<Watch> {
        self.lock().watches.get(&id).cloned()
    }

    /// Watch ids linked to `owner_id`, in insertion order.
    pub fn owner_links(&self, owner_id: OwnerId) -> Vec<WatchId> {
        self.lock().owners.get(&owner_id).map(|o| o.watch_ids.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WatchRepository for InMemoryStore {
    async fn find_watches_for_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<Watch>, PersistenceError> {
        Ok(self.lock().watches.values().filter(|w| w.owner_id == owner_id).cloned().collect())
    }

    async fn create_watch(&self, watch: &Watch) -> Result<Watch, PersistenceError> {
        self.record();
        if watch.id.is_some() {
            return Err(PersistenceError::InvalidInput("watch already has an id".to_string()));
        }
        let mut tables = self.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        let stored = Watch { id: Some(id), ..watch.clone() };
        tables.watches.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_watch(&self, id: WatchId) -> Result<bool, PersistenceError> {
        self.record();
        Ok(self.lock().watches.remove(&id).is_some())
    }

    async fn find_watch(&self, id: WatchId) -> Result<Option<Watch>, PersistenceError> {
        let tables = self.lock();
        if tables.unreadable.contains(&id) {
            return Err(PersistenceError::OperationFailed(format!("watch {id} is unreadable")));
        }
        Ok(tables.watches.get(&id).cloned())
    }

    async fn set_paused(&self, id: WatchId, paused: bool) -> Result<(), PersistenceError> {
        self.record();
        match self.lock().watches.get_mut(&id) {
            Some(watch) => {
                watch.paused = paused;
                Ok(())
            }
            None => Err(PersistenceError::NotFound(format!("watch {id}"))),
        }
    }
}

#[async_trait]
impl OwnerRepository for InMemoryStore {
    async fn list_owners(&self) -> Result<Vec<Owner>, PersistenceError> {
        Ok(self.lock().owners.values().cloned().collect())
    }

    async fn watch_ids_for_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<WatchId>, PersistenceError> {
        Ok(self.owner_links(owner_id))
    }

    async fn find_owner_of_watch(
        &self,
        watch_id: WatchId,
    ) -> Result<Option<OwnerId>, PersistenceError> {
        Ok(self.lock().owners.values().find(|o| o.watch_ids.contains(&watch_id)).map(|o| o.id))
    }

    async fn add_watch_to_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<(), PersistenceError> {
        self.record();
        let mut tables = self.lock();
        let owner = tables
            .owners
            .entry(owner_id)
            .or_insert_with(|| Owner { id: owner_id, username: None, watch_ids: vec![] });
        if owner.watch_ids.contains(&watch_id) {
            return Err(PersistenceError::AlreadyExists(format!("watch {watch_id}")));
        }
        if owner.watch_ids.len() >= MAX_WATCHES_PER_OWNER {
            return Err(PersistenceError::CapacityReached { owner_id });
        }
        owner.watch_ids.push(watch_id);
        Ok(())
    }

    async fn remove_watch_from_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<bool, PersistenceError> {
        self.record();
        let mut tables = self.lock();
        let Some(owner) = tables.owners.get_mut(&owner_id) else {
            return Ok(false);
        };
        let before = owner.watch_ids.len();
        owner.watch_ids.retain(|id| *id != watch_id);
        Ok(owner.watch_ids.len() != before)
    }

    async fn upsert_owner(
        &self,
        owner_id: OwnerId,
        username: Option<String>,
    ) -> Result<(), PersistenceError> {
        self.record();
        self.lock()
            .owners
            .entry(owner_id)
            .and_modify(|o| o.username = username.clone())
            .or_insert(Owner { id: owner_id, username, watch_ids: vec![] });
        Ok(())
    }
}

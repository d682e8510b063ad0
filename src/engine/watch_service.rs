//! The operations a chat front end calls to manage watches.

use std::sync::Arc;

use thiserror::Error;

use super::{
    registry::RegistryError,
    subscription_manager::{SubscriptionError, SubscriptionManager, TeardownReason},
};
use crate::{
    models::{InvalidAddress, MAX_WATCHES_PER_OWNER, OwnerId, Watch, WatchId, parse_address},
    persistence::{OwnerRepository, PersistenceError, WatchRepository},
    providers::{AssetInfo, AssetInfoProvider, ProviderError},
};

/// Errors returned by [`WatchService`].
#[derive(Debug, Error)]
pub enum WatchServiceError {
    /// A token or pair address is malformed.
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    /// The owner already holds `MAX_WATCHES_PER_OWNER` watches.
    #[error("Owner {owner_id} already holds the maximum number of watches")]
    CapacityReached {
        /// The owner at capacity.
        owner_id: OwnerId,
    },

    /// No watch with this id is stored.
    #[error("Watch {0} not found")]
    NotFound(WatchId),

    /// A storage call failed.
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The asset lookup failed.
    #[error("Asset lookup failed: {0}")]
    Provider(#[from] ProviderError),

    /// Starting or stopping the subscription failed.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

/// Saves, deletes, pauses and resumes watches, keeping storage and running
/// subscriptions in step.
pub struct WatchService {
    watches: Arc<dyn WatchRepository>,
    owners: Arc<dyn OwnerRepository>,
    assets: Arc<dyn AssetInfoProvider>,
    manager: Arc<SubscriptionManager>,
}

impl WatchService {
    /// Creates the service over the stores, the asset lookup and the manager.
    pub fn new(
        watches: Arc<dyn WatchRepository>,
        owners: Arc<dyn OwnerRepository>,
        assets: Arc<dyn AssetInfoProvider>,
        manager: Arc<SubscriptionManager>,
    ) -> Self {
        Self { watches, owners, assets, manager }
    }

    /// Resolves token metadata and holder count for a token and its pair.
    pub async fn lookup_asset(&self, token: &str, pair: &str) -> Result<AssetInfo, WatchServiceError> {
        let token = parse_address(token)?;
        let pair = parse_address(pair)?;
        Ok(self.assets.asset_info(token, pair).await?)
    }

    /// All watches created by `owner_id`.
    pub async fn list_watches(&self, owner_id: OwnerId) -> Result<Vec<Watch>, WatchServiceError> {
        Ok(self.watches.find_watches_for_owner(owner_id).await?)
    }

    /// Persists a new watch, links it to its owner and starts it unless it
    /// is paused.
    ///
    /// A watch that was saved but could not be subscribed is still returned;
    /// the next resync retries the subscription.
    #[tracing::instrument(skip_all, fields(owner_id = watch.owner_id, channel_id = watch.channel_id))]
    pub async fn save_watch(&self, watch: Watch) -> Result<Watch, WatchServiceError> {
        let owner_id = watch.owner_id;
        if self.owners.watch_ids_for_owner(owner_id).await?.len() >= MAX_WATCHES_PER_OWNER {
            return Err(WatchServiceError::CapacityReached { owner_id });
        }

        let created = self.watches.create_watch(&watch).await?;
        let id = created.id.ok_or_else(|| {
            PersistenceError::OperationFailed("created watch has no id".to_string())
        })?;

        if let Err(e) = self.owners.add_watch_to_owner(owner_id, id).await {
            self.watches.delete_watch(id).await?;
            return Err(match e {
                PersistenceError::CapacityReached { owner_id } => {
                    WatchServiceError::CapacityReached { owner_id }
                }
                other => other.into(),
            });
        }

        if !created.paused
            && let Err(e) = self.manager.activate(created.clone()).await
        {
            tracing::warn!(watch_id = id, error = %e, "Watch saved but not subscribed.");
        }

        tracing::info!(watch_id = id, "Watch saved.");
        Ok(created)
    }

    /// Stops and removes a watch. Returns `false` when there was nothing to
    /// remove.
    #[tracing::instrument(skip(self))]
    pub async fn delete_watch(&self, watch_id: WatchId) -> Result<bool, WatchServiceError> {
        if self.manager.teardown(watch_id, TeardownReason::UserDelete).await?.is_some() {
            return Ok(true);
        }

        // Not running, for instance paused. Storage is purged directly.
        let unlinked = match self.owners.find_owner_of_watch(watch_id).await? {
            Some(owner_id) => self.owners.remove_watch_from_owner(owner_id, watch_id).await?,
            None => false,
        };
        let deleted = self.watches.delete_watch(watch_id).await?;
        Ok(unlinked || deleted)
    }

    /// Stops the subscription and persists the paused flag.
    #[tracing::instrument(skip(self))]
    pub async fn pause_watch(&self, watch_id: WatchId) -> Result<(), WatchServiceError> {
        self.set_paused(watch_id, true).await?;
        self.manager.teardown(watch_id, TeardownReason::Paused).await?;
        Ok(())
    }

    /// Clears the paused flag and resubscribes. Resuming a running watch is
    /// a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn resume_watch(&self, watch_id: WatchId) -> Result<(), WatchServiceError> {
        self.set_paused(watch_id, false).await?;
        let watch = self
            .watches
            .find_watch(watch_id)
            .await?
            .ok_or(WatchServiceError::NotFound(watch_id))?;

        match self.manager.activate(watch).await {
            Ok(()) | Err(SubscriptionError::Registry(RegistryError::DuplicateWatch(_))) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_paused(&self, watch_id: WatchId, paused: bool) -> Result<(), WatchServiceError> {
        self.watches.set_paused(watch_id, paused).await.map_err(|e| match e {
            PersistenceError::NotFound(_) => WatchServiceError::NotFound(watch_id),
            other => other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinHandle;

    use super::*;
    use crate::{
        config::NotificationConfig,
        engine::{AlertPipeline, WatchRegistry, WatchState},
        enrichment::EnrichmentClient,
        notification::NotificationFormatter,
        test_helpers::{
            InMemoryStore, RecordingSink, ScriptedStreamProvider, StaticAdProvider,
            StaticMarketData, WatchBuilder,
        },
    };

    struct Fixture {
        service: WatchService,
        manager: Arc<SubscriptionManager>,
        store: Arc<InMemoryStore>,
        streams: Arc<ScriptedStreamProvider>,
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedStreamProvider::new())
    }

    fn fixture_with(streams: ScriptedStreamProvider) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let streams = Arc::new(streams);
        let market = Arc::new(StaticMarketData::new());
        let pipeline = AlertPipeline::new(
            EnrichmentClient::new(market.clone(), market.clone(), market.clone()),
            NotificationFormatter::new(NotificationConfig::default()).unwrap(),
            Arc::new(StaticAdProvider::new(None)),
            Arc::new(RecordingSink::new()),
        );
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(WatchRegistry::new()),
            streams.clone(),
            Arc::new(pipeline),
            store.clone(),
            store.clone(),
            16,
        ));
        let service = WatchService::new(store.clone(), store.clone(), market, manager.clone());
        Fixture { service, manager, store, streams }
    }

    fn pair(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    #[tokio::test]
    async fn test_save_watch_persists_links_and_activates() {
        let f = fixture();
        let saved = f.service.save_watch(WatchBuilder::new().owner(5).build()).await.unwrap();
        let id = saved.id.unwrap();

        assert_eq!(f.store.owner_links(5), vec![id]);
        assert_eq!(f.manager.state(id), WatchState::Active);
    }

    #[tokio::test]
    async fn test_save_paused_watch_does_not_subscribe() {
        let f = fixture();
        f.service.save_watch(WatchBuilder::new().paused(true).build()).await.unwrap();
        assert_eq!(f.streams.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_save_watch_enforces_cap() {
        let f = fixture();
        for n in 1..=3 {
            f.service.save_watch(WatchBuilder::new().owner(5).pair(&pair(n)).build()).await.unwrap();
        }

        let result = f.service.save_watch(WatchBuilder::new().owner(5).pair(&pair(4)).build()).await;
        assert!(matches!(result, Err(WatchServiceError::CapacityReached { owner_id: 5 })));
        assert_eq!(f.service.list_watches(5).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_running_and_paused_watches() {
        let f = fixture();
        let running = f.service.save_watch(WatchBuilder::new().owner(5).build()).await.unwrap();
        let paused = f
            .service
            .save_watch(WatchBuilder::new().owner(5).pair(&pair(2)).paused(true).build())
            .await
            .unwrap();

        assert!(f.service.delete_watch(running.id.unwrap()).await.unwrap());
        assert!(f.service.delete_watch(paused.id.unwrap()).await.unwrap());
        assert!(!f.service.delete_watch(paused.id.unwrap()).await.unwrap());

        assert!(f.store.owner_links(5).is_empty());
        assert!(f.manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let f = fixture();
        let saved = f.service.save_watch(WatchBuilder::new().build()).await.unwrap();
        let id = saved.id.unwrap();

        f.service.pause_watch(id).await.unwrap();
        assert!(f.store.stored_watch(id).unwrap().paused);
        assert!(f.manager.registry().lookup(id).await.is_none());

        f.service.resume_watch(id).await.unwrap();
        assert!(!f.store.stored_watch(id).unwrap().paused);
        assert_eq!(f.manager.state(id), WatchState::Active);

        // Resuming twice is harmless.
        f.service.resume_watch(id).await.unwrap();
        assert_eq!(f.streams.subscribe_calls(), 2);
    }

    #[tokio::test]
    async fn test_pause_unknown_watch() {
        let f = fixture();
        assert!(matches!(f.service.pause_watch(42).await, Err(WatchServiceError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_lookup_asset_validates_addresses() {
        let f = fixture();
        let info = f.service.lookup_asset(&pair(1), &pair(2)).await.unwrap();
        assert_eq!(info.holders, 1234);

        let result = f.service.lookup_asset("6982508145454ce325ddbe47a25d4ec3d2311933", &pair(2)).await;
        assert!(matches!(result, Err(WatchServiceError::InvalidAddress(_))));
    }

    /// Starts activating a seeded watch behind a slow handshake and waits
    /// until the subscription is in flight.
    async fn activate_slowly(f: &Fixture, watch: Watch) -> JoinHandle<Result<(), SubscriptionError>> {
        let id = watch.id.unwrap();
        let manager = Arc::clone(&f.manager);
        let activation = tokio::spawn(async move { manager.activate(watch).await });
        while f.manager.state(id) != WatchState::Subscribing {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        activation
    }

    fn slow_fixture() -> Fixture {
        fixture_with(ScriptedStreamProvider::new().with_subscribe_delay(Duration::from_millis(100)))
    }

    #[tokio::test]
    async fn test_delete_while_subscribing_stops_the_activation() {
        let f = slow_fixture();
        let watch = f.store.seed(WatchBuilder::new().owner(5).build());
        let id = watch.id.unwrap();
        let pair = watch.asset.pair;
        let activation = activate_slowly(&f, watch).await;

        assert!(f.service.delete_watch(id).await.unwrap());

        assert!(matches!(activation.await.unwrap(), Err(SubscriptionError::Cancelled(_))));
        assert!(f.store.stored_watch(id).is_none());
        assert!(f.store.owner_links(5).is_empty());
        assert!(f.manager.registry().lookup(id).await.is_none());
        assert_eq!(f.manager.state(id), WatchState::Inactive);
        assert!(f.streams.cancel_token(pair).unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_pause_while_subscribing_stops_the_activation() {
        let f = slow_fixture();
        let watch = f.store.seed(WatchBuilder::new().build());
        let id = watch.id.unwrap();
        let activation = activate_slowly(&f, watch).await;

        f.service.pause_watch(id).await.unwrap();

        assert!(matches!(activation.await.unwrap(), Err(SubscriptionError::Cancelled(_))));
        assert!(f.store.stored_watch(id).unwrap().paused);
        assert!(f.manager.registry().lookup(id).await.is_none());
        assert_eq!(f.manager.state(id), WatchState::Inactive);
    }

    #[tokio::test]
    async fn test_resume_while_paused_mid_subscribe_keeps_the_activation() {
        let f = slow_fixture();
        let watch = f.store.seed(WatchBuilder::new().build());
        let id = watch.id.unwrap();
        let activation = activate_slowly(&f, watch).await;

        f.service.pause_watch(id).await.unwrap();
        f.service.resume_watch(id).await.unwrap();

        activation.await.unwrap().unwrap();
        assert!(!f.store.stored_watch(id).unwrap().paused);
        assert!(f.manager.registry().lookup(id).await.is_some());
        assert_eq!(f.manager.state(id), WatchState::Active);
        assert_eq!(f.streams.subscribe_calls(), 1);
    }
}

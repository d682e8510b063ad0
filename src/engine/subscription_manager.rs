//! Owns one event stream per active watch and the reader task behind it.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

use super::{
    pipeline::{AlertPipeline, PipelineContext, PipelineOutcome},
    registry::{RegistryError, SubscriptionHandle, WatchRegistry},
};
use crate::{
    models::{MAX_WATCHES_PER_OWNER, Watch, WatchId},
    persistence::{OwnerRepository, PersistenceError, WatchRepository},
    stream::{EventStream, EventStreamProvider, StreamError, StreamItem},
};

/// Errors raised while starting or stopping a subscription.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The registry refused the entry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The upstream did not accept the subscription.
    #[error("Failed to open event stream: {0}")]
    Stream(#[from] StreamError),

    /// Purging a torn-down watch from storage failed.
    #[error("Storage error during teardown: {0}")]
    Persistence(#[from] PersistenceError),

    /// Paused watches are never subscribed.
    #[error("Watch {0} is paused")]
    Paused(WatchId),

    /// The watch was torn down while its stream was still opening.
    #[error("Watch {0} was torn down while subscribing")]
    Cancelled(WatchId),

    /// The manager no longer accepts new subscriptions.
    #[error("Subscription manager is shutting down")]
    ShuttingDown,
}

/// Lifecycle of a watch inside this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No subscription. Also the state a watch returns to after teardown.
    Inactive,
    /// An activation is opening the stream.
    Subscribing,
    /// Registered and read by a live reader task.
    Active,
    /// Torn down while still subscribing. The pending activation cancels
    /// its stream as soon as it opens.
    Revoked,
}

/// Why a watch is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The owner deleted the watch.
    UserDelete,
    /// The owner paused the watch.
    Paused,
    /// The destination channel rejected the bot permanently.
    DeliveryForbidden,
    /// The upstream completed the subscription.
    StreamEnded,
    /// The upstream reported an error.
    StreamFailed,
}

impl TeardownReason {
    /// Whether the persisted watch and its owner link go too.
    pub fn purges_storage(self) -> bool {
        matches!(self, TeardownReason::UserDelete | TeardownReason::DeliveryForbidden)
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TeardownReason::UserDelete => "user_delete",
            TeardownReason::Paused => "paused",
            TeardownReason::DeliveryForbidden => "delivery_forbidden",
            TeardownReason::StreamEnded => "stream_ended",
            TeardownReason::StreamFailed => "stream_failed",
        };
        f.write_str(reason)
    }
}

/// State of one watch, tagged with the activation that set it.
#[derive(Debug, Clone, Copy)]
struct Slot {
    state: WatchState,
    claim: u64,
}

/// Starts and stops subscriptions and feeds their events to the pipeline.
///
/// Each active watch gets one reader task. The reader takes a permit from a
/// per-watch semaphore before it spawns the pipeline task for an event, so
/// at most `max_in_flight` pipelines exist per watch and the upstream
/// channel buffers the rest. Alerts for one watch may go out of order.
///
/// Only watches that are subscribing or active have an entry in `states`.
pub struct SubscriptionManager {
    registry: Arc<WatchRegistry>,
    streams: Arc<dyn EventStreamProvider>,
    pipeline: Arc<AlertPipeline>,
    watches: Arc<dyn WatchRepository>,
    owners: Arc<dyn OwnerRepository>,
    states: DashMap<WatchId, Slot>,
    next_claim: AtomicU64,
    max_in_flight: usize,
    tasks: TaskTracker,
}

impl SubscriptionManager {
    /// Creates a manager. `max_in_flight` is clamped to at least one.
    pub fn new(
        registry: Arc<WatchRegistry>,
        streams: Arc<dyn EventStreamProvider>,
        pipeline: Arc<AlertPipeline>,
        watches: Arc<dyn WatchRepository>,
        owners: Arc<dyn OwnerRepository>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            registry,
            streams,
            pipeline,
            watches,
            owners,
            states: DashMap::new(),
            next_claim: AtomicU64::new(1),
            max_in_flight: max_in_flight.max(1),
            tasks: TaskTracker::new(),
        }
    }

    /// The registry of running subscriptions.
    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Current lifecycle state of `id`.
    pub fn state(&self, id: WatchId) -> WatchState {
        self.states.get(&id).map_or(WatchState::Inactive, |slot| slot.state)
    }

    /// Opens a stream for `watch` and starts reading it.
    ///
    /// Resolves once the upstream accepted the subscription and the watch is
    /// registered. Fails without side effects when the watch is paused,
    /// already subscribing or running, or its owner is at capacity. A
    /// teardown that lands while the stream is opening wins: the stream is
    /// cancelled and `Cancelled` is returned.
    #[tracing::instrument(skip_all, fields(watch_id = ?watch.id, pair = %watch.asset.pair))]
    pub async fn activate(self: &Arc<Self>, watch: Watch) -> Result<(), SubscriptionError> {
        let id = watch.id.ok_or(RegistryError::Unpersisted)?;
        if watch.paused {
            return Err(SubscriptionError::Paused(id));
        }
        let claim = self.claim(id)?;

        if self.registry.owner_count(watch.owner_id).await >= MAX_WATCHES_PER_OWNER {
            self.release(id, claim);
            return Err(RegistryError::CapacityReached { owner_id: watch.owner_id }.into());
        }

        let stream = match self.streams.subscribe(watch.asset.pair).await {
            Ok(stream) => stream,
            Err(e) => {
                self.release(id, claim);
                return Err(e.into());
            }
        };

        let handle = SubscriptionHandle::new(watch.clone(), stream.cancel.clone());
        if let Err(e) = self.registry.register(handle).await {
            stream.cancel.cancel();
            self.release(id, claim);
            return Err(e.into());
        }

        if !self.promote(id, claim) {
            stream.cancel.cancel();
            self.registry.revoke_cancelled(id).await;
            self.release(id, claim);
            tracing::info!("Watch torn down while subscribing.");
            return Err(SubscriptionError::Cancelled(id));
        }

        let manager = Arc::clone(self);
        self.tasks.spawn(async move { manager.read_stream(Arc::new(watch), stream).await });

        tracing::info!("Watch activated.");
        Ok(())
    }

    /// Marks `id` as subscribing and returns the claim tag.
    ///
    /// A watch revoked mid-subscribe is handed back to the activation still
    /// in flight, which then completes normally.
    fn claim(&self, id: WatchId) -> Result<u64, SubscriptionError> {
        if self.tasks.is_closed() {
            return Err(SubscriptionError::ShuttingDown);
        }
        let mut slot = self.states.entry(id).or_insert(Slot { state: WatchState::Inactive, claim: 0 });
        match slot.state {
            WatchState::Inactive => {
                let claim = self.next_claim.fetch_add(1, Ordering::Relaxed);
                *slot = Slot { state: WatchState::Subscribing, claim };
                Ok(claim)
            }
            WatchState::Revoked => {
                slot.state = WatchState::Subscribing;
                Err(RegistryError::DuplicateWatch(id).into())
            }
            WatchState::Subscribing | WatchState::Active => {
                Err(RegistryError::DuplicateWatch(id).into())
            }
        }
    }

    /// Moves a claim from subscribing to active. Fails when a teardown
    /// revoked or evicted it in the meantime.
    fn promote(&self, id: WatchId, claim: u64) -> bool {
        match self.states.get_mut(&id) {
            Some(mut slot) if slot.claim == claim && slot.state == WatchState::Subscribing => {
                slot.state = WatchState::Active;
                true
            }
            _ => false,
        }
    }

    /// Drops the state of `id` if it still belongs to `claim`.
    fn release(&self, id: WatchId, claim: u64) {
        self.states.remove_if(&id, |_, slot| slot.claim == claim);
    }

    /// Handles a teardown that found no registry entry. A watch that is
    /// still subscribing is flagged so its activation cancels itself; any
    /// other state is evicted. Returns whether it was flagged.
    fn flag_or_evict(&self, id: WatchId) -> bool {
        match self.states.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().state == WatchState::Subscribing {
                    entry.get_mut().state = WatchState::Revoked;
                    true
                } else {
                    entry.remove();
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    async fn read_stream(self: Arc<Self>, watch: Arc<Watch>, mut stream: EventStream) {
        let Some(id) = watch.id else { return };
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));

        let reason = 'read: loop {
            let item = tokio::select! {
                biased;
                _ = stream.cancel.cancelled() => break None,
                item = stream.events.recv() => item,
            };
            match item {
                Some(StreamItem::Events(events)) => {
                    for event in events {
                        let permit = tokio::select! {
                            biased;
                            _ = stream.cancel.cancelled() => None,
                            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                        };
                        let Some(permit) = permit else { break 'read None };
                        self.dispatch(PipelineContext { watch: Arc::clone(&watch), event }, permit);
                    }
                }
                Some(StreamItem::Error(e)) => {
                    tracing::warn!(watch_id = id, error = %e, "Event stream failed.");
                    break Some(TeardownReason::StreamFailed);
                }
                None => {
                    tracing::info!(watch_id = id, "Event stream completed.");
                    break Some(TeardownReason::StreamEnded);
                }
            }
        };

        if let Some(reason) = reason
            && let Err(e) = self.teardown(id, reason).await
        {
            tracing::error!(watch_id = id, error = %e, "Teardown after stream end failed.");
        }
    }

    fn dispatch(self: &Arc<Self>, ctx: PipelineContext, permit: OwnedSemaphorePermit) {
        let manager = Arc::clone(self);
        self.tasks.spawn(async move {
            let _permit = permit;
            if manager.pipeline.process(&ctx).await == PipelineOutcome::Unreachable
                && let Some(id) = ctx.watch.id
                && let Err(e) = manager.teardown(id, TeardownReason::DeliveryForbidden).await
            {
                tracing::error!(watch_id = id, error = %e, "Teardown after forbidden delivery failed.");
            }
        });
    }

    /// Stops a watch. Safe to call from any number of places at once.
    ///
    /// The registry entry is revoked first. Whoever revokes it cancels the
    /// stream and, for a delete or a forbidden channel, removes the watch
    /// from its owner and from storage. Everyone else gets `Ok(None)` and
    /// touches nothing. A watch that is still subscribing is flagged so its
    /// activation cancels itself.
    #[tracing::instrument(skip(self))]
    pub async fn teardown(
        &self,
        watch_id: WatchId,
        reason: TeardownReason,
    ) -> Result<Option<Watch>, SubscriptionError> {
        let handle = match self.registry.revoke(watch_id).await {
            Ok(handle) => handle,
            Err(RegistryError::NotFound(_)) => {
                if self.flag_or_evict(watch_id) {
                    tracing::info!(%reason, "Watch revoked while subscribing.");
                } else {
                    tracing::debug!("Watch is not registered, nothing to tear down.");
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        handle.cancel();
        // Also drops a claim that registered but was not promoted yet, which
        // then fails to promote.
        self.states.remove(&watch_id);
        tracing::info!(%reason, "Watch torn down.");

        let watch = handle.watch().clone();
        if reason.purges_storage() {
            self.owners.remove_watch_from_owner(watch.owner_id, watch_id).await?;
            self.watches.delete_watch(watch_id).await?;
        }
        Ok(Some(watch))
    }

    /// Cancels every subscription and waits for readers and in-flight
    /// pipelines to finish. Persisted watches are kept.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.states.retain(|_, slot| {
            if slot.state == WatchState::Subscribing {
                slot.state = WatchState::Revoked;
                true
            } else {
                false
            }
        });
        let handles = self.registry.drain().await;
        tracing::info!(count = handles.len(), "Cancelling subscriptions.");
        for handle in handles {
            handle.cancel();
        }
        self.tasks.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::NotificationConfig,
        delivery::DeliveryError,
        enrichment::EnrichmentClient,
        notification::NotificationFormatter,
        test_helpers::{
            InMemoryStore, RecordingSink, ScriptedStreamProvider, StaticAdProvider,
            StaticMarketData, TradeEventBuilder, WatchBuilder,
        },
    };

    struct Fixture {
        manager: Arc<SubscriptionManager>,
        streams: Arc<ScriptedStreamProvider>,
        sink: Arc<RecordingSink>,
        store: Arc<InMemoryStore>,
    }

    fn fixture(sink: RecordingSink) -> Fixture {
        fixture_with(ScriptedStreamProvider::new(), sink)
    }

    fn fixture_with(streams: ScriptedStreamProvider, sink: RecordingSink) -> Fixture {
        let streams = Arc::new(streams);
        let sink = Arc::new(sink);
        let store = Arc::new(InMemoryStore::new());
        let market = Arc::new(StaticMarketData::new());
        let pipeline = AlertPipeline::new(
            EnrichmentClient::new(market.clone(), market.clone(), market),
            NotificationFormatter::new(NotificationConfig::default()).unwrap(),
            Arc::new(StaticAdProvider::new(None)),
            sink.clone(),
        );
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(WatchRegistry::new()),
            streams.clone(),
            Arc::new(pipeline),
            store.clone(),
            store.clone(),
            4,
        ));
        Fixture { manager, streams, sink, store }
    }

    async fn wait_for_state(manager: &SubscriptionManager, id: WatchId, state: WatchState) -> bool {
        for _ in 0..200 {
            if manager.state(id) == state {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_activate_registers_and_delivers() {
        let f = fixture(RecordingSink::new());
        let watch = f.store.seed(WatchBuilder::new().build());
        let pair = watch.asset.pair;

        f.manager.activate(watch.clone()).await.unwrap();
        assert_eq!(f.manager.state(1), WatchState::Active);
        assert!(f.manager.registry().lookup(1).await.is_some());

        f.streams.push(pair, vec![TradeEventBuilder::new().build()]).await;
        assert!(f.sink.wait_for_calls(1, Duration::from_secs(2)).await);
        assert_eq!(f.sink.delivered()[0].0, watch.channel_id);
    }

    #[tokio::test]
    async fn test_activate_rejects_paused_and_duplicate() {
        let f = fixture(RecordingSink::new());
        let paused = f.store.seed(WatchBuilder::new().paused(true).build());
        assert!(matches!(
            f.manager.activate(paused).await,
            Err(SubscriptionError::Paused(_))
        ));

        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.activate(watch.clone()).await.unwrap();
        assert!(matches!(
            f.manager.activate(watch).await,
            Err(SubscriptionError::Registry(RegistryError::DuplicateWatch(_)))
        ));
        assert_eq!(f.streams.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_activate_stream_failure_leaves_watch_inactive() {
        let streams = Arc::new(ScriptedStreamProvider::failing());
        let f = fixture(RecordingSink::new());
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(WatchRegistry::new()),
            streams,
            Arc::clone(&f.manager.pipeline),
            f.store.clone(),
            f.store.clone(),
            4,
        ));
        let watch = f.store.seed(WatchBuilder::new().build());

        assert!(matches!(manager.activate(watch).await, Err(SubscriptionError::Stream(_))));
        assert_eq!(manager.state(1), WatchState::Inactive);
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_stream_completion_revokes_but_keeps_storage() {
        let f = fixture(RecordingSink::new());
        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.activate(watch.clone()).await.unwrap();

        f.streams.complete(watch.asset.pair);

        assert!(wait_for_state(&f.manager, 1, WatchState::Inactive).await);
        assert!(!f.manager.states.contains_key(&1));
        assert!(f.manager.registry().lookup(1).await.is_none());
        assert!(f.store.stored_watch(1).is_some());
        assert_eq!(f.store.mutations(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_revokes() {
        let f = fixture(RecordingSink::new());
        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.activate(watch.clone()).await.unwrap();

        f.streams.fail(watch.asset.pair, StreamError::Server("boom".to_string())).await;

        assert!(wait_for_state(&f.manager, 1, WatchState::Inactive).await);
        assert!(f.manager.registry().is_empty().await);
        assert!(f.store.stored_watch(1).is_some());
    }

    #[tokio::test]
    async fn test_forbidden_delivery_tears_down_with_purge() {
        let f = fixture(RecordingSink::failing_with(DeliveryError::PermanentlyUnreachable(
            "bot was kicked".to_string(),
        )));
        let watch = f.store.seed(WatchBuilder::new().owner(9).build());
        f.manager.activate(watch.clone()).await.unwrap();
        let cancel = f.streams.cancel_token(watch.asset.pair).unwrap();

        f.streams.push(watch.asset.pair, vec![TradeEventBuilder::new().build()]).await;

        assert!(wait_for_state(&f.manager, 1, WatchState::Inactive).await);
        // Wait for the purge that follows the revocation.
        for _ in 0..200 {
            if f.store.stored_watch(1).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cancel.is_cancelled());
        assert!(f.store.stored_watch(1).is_none());
        assert!(f.store.owner_links(9).is_empty());
    }

    #[tokio::test]
    async fn test_teardown_twice_is_a_noop() {
        let f = fixture(RecordingSink::new());
        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.activate(watch).await.unwrap();

        let first = f.manager.teardown(1, TeardownReason::DeliveryForbidden).await.unwrap();
        assert!(first.is_some());
        let after_first = f.store.mutations();

        let second = f.manager.teardown(1, TeardownReason::DeliveryForbidden).await.unwrap();
        assert!(second.is_none());
        assert_eq!(f.store.mutations(), after_first);
        assert!(f.manager.states.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything() {
        let f = fixture(RecordingSink::new());
        let first = f.store.seed(WatchBuilder::new().build());
        let second = f.store.seed(
            WatchBuilder::new().pair("0x0000000000000000000000000000000000000002").build(),
        );
        f.manager.activate(first.clone()).await.unwrap();
        f.manager.activate(second.clone()).await.unwrap();

        f.manager.shutdown().await;

        assert!(f.manager.registry().is_empty().await);
        assert!(f.streams.cancel_token(first.asset.pair).unwrap().is_cancelled());
        assert!(f.streams.cancel_token(second.asset.pair).unwrap().is_cancelled());
        assert!(f.store.stored_watch(first.id.unwrap()).is_some());
    }

    #[tokio::test]
    async fn test_teardown_while_subscribing_cancels_the_activation() {
        let f = fixture_with(
            ScriptedStreamProvider::new().with_subscribe_delay(Duration::from_millis(100)),
            RecordingSink::new(),
        );
        let watch = f.store.seed(WatchBuilder::new().build());
        let pair = watch.asset.pair;

        let manager = Arc::clone(&f.manager);
        let activation = tokio::spawn(async move { manager.activate(watch).await });
        assert!(wait_for_state(&f.manager, 1, WatchState::Subscribing).await);

        let torn_down = f.manager.teardown(1, TeardownReason::UserDelete).await.unwrap();
        assert!(torn_down.is_none());
        assert_eq!(f.manager.state(1), WatchState::Revoked);

        assert!(matches!(activation.await.unwrap(), Err(SubscriptionError::Cancelled(1))));
        assert!(f.manager.registry().is_empty().await);
        assert_eq!(f.manager.state(1), WatchState::Inactive);
        assert!(f.streams.cancel_token(pair).unwrap().is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_activations_subscribe_once() {
        let f = fixture_with(
            ScriptedStreamProvider::new().with_subscribe_delay(Duration::from_millis(50)),
            RecordingSink::new(),
        );
        let watch = f.store.seed(WatchBuilder::new().build());

        let activations: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&f.manager);
                let watch = watch.clone();
                tokio::spawn(async move { manager.activate(watch).await })
            })
            .collect();

        let mut succeeded = 0;
        for activation in activations {
            match activation.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(SubscriptionError::Registry(RegistryError::DuplicateWatch(1))) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(f.streams.subscribe_calls(), 1);
        assert_eq!(f.manager.state(1), WatchState::Active);
        assert_eq!(f.manager.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_reader_bounds_live_pipeline_tasks() {
        let f = fixture(RecordingSink::new().delay_when("", Duration::from_secs(5)));
        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.activate(watch.clone()).await.unwrap();

        let events = (0..50).map(|_| TradeEventBuilder::new().build()).collect();
        assert!(f.streams.push(watch.asset.pair, events).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The reader plus one task per permit.
        assert_eq!(f.manager.tasks.len(), f.manager.max_in_flight + 1);
        assert_eq!(f.sink.calls(), 0);

        f.manager.teardown(1, TeardownReason::Paused).await.unwrap();
    }

    #[tokio::test]
    async fn test_activate_after_shutdown_is_refused() {
        let f = fixture(RecordingSink::new());
        let watch = f.store.seed(WatchBuilder::new().build());
        f.manager.shutdown().await;

        assert!(matches!(f.manager.activate(watch).await, Err(SubscriptionError::ShuttingDown)));
        assert_eq!(f.streams.subscribe_calls(), 0);
    }
}

//! Wiring shared by the integration tests.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use buywatch::{
    config::NotificationConfig,
    delivery::DeliverySink,
    engine::{AlertPipeline, SubscriptionManager, WatchRegistry},
    enrichment::EnrichmentClient,
    notification::NotificationFormatter,
    persistence::{OwnerRepository, SqliteStore, WatchRepository},
    test_helpers::{ScriptedStreamProvider, StaticAdProvider, StaticMarketData},
};

pub struct Harness {
    pub manager: Arc<SubscriptionManager>,
    pub streams: Arc<ScriptedStreamProvider>,
    pub market: Arc<StaticMarketData>,
    pub ads: Arc<StaticAdProvider>,
}

pub fn harness<S, R>(sink: Arc<S>, store: Arc<R>) -> Harness
where
    S: DeliverySink + 'static,
    R: WatchRepository + OwnerRepository + 'static,
{
    harness_with(sink, store, StaticMarketData::new(), 16)
}

pub fn harness_with<S, R>(
    sink: Arc<S>,
    store: Arc<R>,
    market: StaticMarketData,
    max_in_flight: usize,
) -> Harness
where
    S: DeliverySink + 'static,
    R: WatchRepository + OwnerRepository + 'static,
{
    let streams = Arc::new(ScriptedStreamProvider::new());
    let market = Arc::new(market);
    let ads = Arc::new(StaticAdProvider::new(Some("Your ad here")));
    let pipeline = AlertPipeline::new(
        EnrichmentClient::new(market.clone(), market.clone(), market.clone()),
        NotificationFormatter::new(NotificationConfig::default()).expect("default template"),
        ads.clone(),
        sink,
    );
    let manager = Arc::new(SubscriptionManager::new(
        Arc::new(WatchRegistry::new()),
        streams.clone(),
        Arc::new(pipeline),
        store.clone(),
        store,
        max_in_flight,
    ));
    Harness { manager, streams, market, ads }
}

pub async fn sqlite_store() -> Arc<SqliteStore> {
    let store = SqliteStore::new("sqlite::memory:").await.expect("in-memory database");
    store.run_migrations().await.expect("migrations");
    Arc::new(store)
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

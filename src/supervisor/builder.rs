//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    delivery::{DeliverySink, TelegramSink},
    engine::{AlertPipeline, SubscriptionManager, WatchRegistry, WatchService},
    enrichment::EnrichmentClient,
    http_client::{HttpClientPool, HttpClientPoolError},
    notification::NotificationFormatter,
    persistence::SqliteStore,
    providers::{
        AssetInfoProvider, DextoolsPairInfoProvider, HoneypotAssetInfoProvider,
        JsonRpcBalanceProvider, RepositoryAdProvider,
    },
    stream::{DefinedStreamProvider, EventStreamProvider},
};

/// Builds the market data providers from configuration.
///
/// Returns the enrichment client together with the asset provider, which the
/// watch service also uses for lookups.
pub(crate) async fn market_data_providers(
    config: &AppConfig,
    pool: &HttpClientPool,
) -> Result<(EnrichmentClient, Arc<dyn AssetInfoProvider>), HttpClientPoolError> {
    let market = &config.market_data;
    let client = pool.get_or_create(&market.retry_policy).await?;

    let assets: Arc<dyn AssetInfoProvider> = Arc::new(HoneypotAssetInfoProvider::new(
        Arc::clone(&client),
        market.honeypot_url.clone(),
        market.chain_id,
    ));
    let balances =
        Arc::new(JsonRpcBalanceProvider::new(Arc::clone(&client), config.rpc_url.clone()));
    let pairs = Arc::new(DextoolsPairInfoProvider::new(
        client,
        market.dextools_url.clone(),
        market.dextools_chain.clone(),
        market.dextools_referer.clone(),
    ));

    Ok((EnrichmentClient::new(Arc::clone(&assets), balances, pairs), assets))
}

/// A builder for creating a `Supervisor` instance.
///
/// The stream provider and delivery sink default to the Defined realtime API
/// and the Telegram Bot API.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    store: Option<Arc<SqliteStore>>,
    stream_provider: Option<Arc<dyn EventStreamProvider>>,
    delivery_sink: Option<Arc<dyn DeliverySink>>,
}

impl SupervisorBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the store.
    pub fn store(mut self, store: Arc<SqliteStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the event stream provider.
    pub fn stream_provider(mut self, stream_provider: Arc<dyn EventStreamProvider>) -> Self {
        self.stream_provider = Some(stream_provider);
        self
    }

    /// Overrides the delivery sink.
    pub fn delivery_sink(mut self, delivery_sink: Arc<dyn DeliverySink>) -> Self {
        self.delivery_sink = Some(delivery_sink);
        self
    }

    /// Wires the providers, pipeline and subscription manager together.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let store = self.store.ok_or(SupervisorError::MissingStore)?;

        let pool = HttpClientPool::new(config.http_base_config.clone());
        let (enrichment, assets) = market_data_providers(&config, &pool).await?;

        let delivery_sink = match self.delivery_sink {
            Some(sink) => sink,
            None => {
                let client = pool.get_or_create(&config.telegram.retry_policy).await?;
                Arc::new(TelegramSink::new(
                    client,
                    config.telegram.api_url.clone(),
                    config.telegram.bot_token.clone(),
                ))
            }
        };
        let stream_provider = self
            .stream_provider
            .unwrap_or_else(|| Arc::new(DefinedStreamProvider::new(config.stream.clone())));

        let pipeline = AlertPipeline::new(
            enrichment,
            NotificationFormatter::new(config.notification.clone())?,
            Arc::new(RepositoryAdProvider::new(Arc::clone(&store))),
            delivery_sink,
        );
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(WatchRegistry::new()),
            stream_provider,
            Arc::new(pipeline),
            store.clone(),
            store.clone(),
            config.max_in_flight_per_watch,
        ));
        let watch_service =
            Arc::new(WatchService::new(store.clone(), store.clone(), assets, Arc::clone(&manager)));

        Ok(Supervisor::new(config, store, manager, watch_service))
    }
}

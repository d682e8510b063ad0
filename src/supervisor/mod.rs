//! The Supervisor manages the lifecycle of the buywatch service.
//!
//! It owns the long-lived services: the SQLite store, the subscription
//! manager and the watch service. On start it resubscribes every persisted,
//! non-paused watch. It then waits for a shutdown signal (Ctrl+C or SIGTERM)
//! and cancels every subscription, waiting at most `shutdown_timeout` for
//! readers and in-flight alerts before closing the store.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
pub(crate) use builder::market_data_providers;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{SubscriptionManager, WatchService, resync},
    http_client::HttpClientPoolError,
    notification::FormatError,
    persistence::{PersistenceError, SqliteStore},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A store was not provided to the `SupervisorBuilder`.
    #[error("Missing store for Supervisor")]
    MissingStore,

    /// Loading watches from the store failed.
    #[error("Failed to load watches from the store: {0}")]
    Persistence(#[from] PersistenceError),

    /// An HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] HttpClientPoolError),

    /// The alert template could not be loaded.
    #[error("Failed to load the alert template: {0}")]
    Template(#[from] FormatError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    config: Arc<AppConfig>,
    store: Arc<SqliteStore>,
    manager: Arc<SubscriptionManager>,
    watch_service: Arc<WatchService>,
    cancellation_token: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(
        config: AppConfig,
        store: Arc<SqliteStore>,
        manager: Arc<SubscriptionManager>,
        watch_service: Arc<WatchService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            manager,
            watch_service,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The surface the chat command layer drives.
    pub fn watch_service(&self) -> Arc<WatchService> {
        Arc::clone(&self.watch_service)
    }

    /// Cancelling this token shuts the supervisor down as a signal would.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Resubscribes persisted watches and runs until a shutdown signal.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();
        let signals = tokio::spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }
            cancellation_token.cancel();
        });

        let report = resync(self.store.as_ref(), self.store.as_ref(), &self.manager).await;
        if let Err(e) = report {
            self.cancellation_token.cancel();
            let _ = signals.await;
            self.store.close().await;
            return Err(e.into());
        }

        self.cancellation_token.cancelled().await;
        let _ = signals.await;

        tracing::info!("Starting graceful shutdown...");
        let shutdown_timeout = self.config.shutdown_timeout;
        if tokio::time::timeout(shutdown_timeout, self.manager.shutdown()).await.is_err() {
            tracing::warn!(
                "Subscriptions did not stop within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        }
        self.store.close().await;

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}

//! Rebuilds the registry from persisted configuration on start.

use std::sync::Arc;

use super::subscription_manager::SubscriptionManager;
use crate::persistence::{OwnerRepository, PersistenceError, WatchRepository};

/// What a resync did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Watches subscribed during the pass.
    pub activated: usize,
    /// Watches skipped because they are paused.
    pub paused: usize,
    /// Owner links whose watch no longer exists, removed during the pass.
    pub pruned: usize,
    /// Watches that could not be loaded, pruned or activated.
    pub failed: usize,
}

/// Subscribes every non-paused watch of every owner.
///
/// Only a failure to list owners aborts the pass. A watch that cannot be
/// loaded or activated is logged and counted as failed; it stays persisted
/// and is picked up by the next resync.
#[tracing::instrument(skip_all)]
pub async fn resync(
    owners: &dyn OwnerRepository,
    watches: &dyn WatchRepository,
    manager: &Arc<SubscriptionManager>,
) -> Result<BootstrapReport, PersistenceError> {
    let mut report = BootstrapReport::default();

    for owner in owners.list_owners().await? {
        for watch_id in owner.watch_ids {
            let watch = match watches.find_watch(watch_id).await {
                Ok(Some(watch)) => watch,
                Ok(None) => {
                    tracing::warn!(owner_id = owner.id, watch_id, "Pruning link to missing watch.");
                    match owners.remove_watch_from_owner(owner.id, watch_id).await {
                        Ok(_) => report.pruned += 1,
                        Err(e) => {
                            tracing::error!(owner_id = owner.id, watch_id, error = %e, "Failed to prune link.");
                            report.failed += 1;
                        }
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!(owner_id = owner.id, watch_id, error = %e, "Failed to load watch.");
                    report.failed += 1;
                    continue;
                }
            };
            if watch.paused {
                report.paused += 1;
                continue;
            }
            match manager.activate(watch).await {
                Ok(()) => report.activated += 1,
                Err(e) => {
                    tracing::warn!(owner_id = owner.id, watch_id, error = %e, "Failed to activate watch.");
                    report.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        activated = report.activated,
        paused = report.paused,
        pruned = report.pruned,
        failed = report.failed,
        "Resync complete."
    );
    Ok(report)
}

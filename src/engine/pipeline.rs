//! The per-event path from a raw trade to a delivered alert.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    delivery::DeliverySink,
    enrichment::EnrichmentClient,
    models::{TradeEvent, Watch},
    notification::NotificationFormatter,
    providers::AdProvider,
};

/// Everything one pipeline run needs. Nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// The watch the event belongs to.
    pub watch: Arc<Watch>,
    /// The event to announce.
    pub event: TradeEvent,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The admission filter rejected the event. Nothing else ran.
    Filtered,
    /// The alert reached the channel.
    Delivered,
    /// The alert was dropped after a formatting error or a transient
    /// delivery failure.
    Dropped,
    /// The destination channel rejected the bot for good. The caller tears
    /// the watch down.
    Unreachable,
}

/// Filter, enrich, format and deliver.
pub struct AlertPipeline {
    enrichment: EnrichmentClient,
    formatter: NotificationFormatter,
    ads: Arc<dyn AdProvider>,
    sink: Arc<dyn DeliverySink>,
}

impl AlertPipeline {
    /// Wires the pipeline stages together.
    pub fn new(
        enrichment: EnrichmentClient,
        formatter: NotificationFormatter,
        ads: Arc<dyn AdProvider>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self { enrichment, formatter, ads, sink }
    }

    /// Runs one event through the pipeline. Never fails: every error is
    /// logged here and folded into the outcome.
    #[tracing::instrument(
        skip_all,
        fields(watch_id = ?ctx.watch.id, channel_id = ctx.watch.channel_id, tx_hash = %ctx.event.tx_hash)
    )]
    /// Runs one event through the pipeline. Never fails; every error ends in an outcome.
    pub async fn process(&self, ctx: &PipelineContext) -> PipelineOutcome {
        if !ctx.watch.admits(&ctx.event) {
            tracing::trace!(kind = ?ctx.event.kind, usd = %ctx.event.usd_total, "Event filtered.");
            return PipelineOutcome::Filtered;
        }

        let enriched = self.enrichment.enrich(&ctx.event, &ctx.watch).await;
        if enriched.is_degraded() {
            tracing::warn!(degraded = ?enriched.degraded, "Rendering alert with degraded data.");
        }

        let ad_text = self
            .ads
            .active_ad_text(Utc::now())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Ad lookup failed, rendering without ad."))
            .ok()
            .flatten();

        let notification =
            match self.formatter.format(&ctx.event, &enriched, &ctx.watch, ad_text.as_deref()) {
                Ok(notification) => notification,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to format alert, dropping it.");
                    return PipelineOutcome::Dropped;
                }
            };

        match self.sink.deliver(ctx.watch.channel_id, &notification).await {
            Ok(()) => {
                tracing::debug!("Alert delivered.");
                PipelineOutcome::Delivered
            }
            Err(e) if e.is_permanent() => {
                tracing::warn!(error = %e, "Channel is unreachable.");
                PipelineOutcome::Unreachable
            }
            Err(e) => {
                tracing::warn!(error = %e, "Delivery failed, dropping alert.");
                PipelineOutcome::Dropped
            }
        }
    }
}

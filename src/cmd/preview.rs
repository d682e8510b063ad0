//! The `preview` command: renders one alert for a stored watch without sending it.

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    config::AppConfig,
    http_client::{HttpClientPool, HttpClientPoolError},
    models::{TradeEvent, TradeKind, WatchId},
    notification::{FormatError, NotificationFormatter},
    persistence::{PersistenceError, SqliteStore, WatchRepository},
    providers::{AdProvider, ProviderError, RepositoryAdProvider},
    supervisor::market_data_providers,
};

/// Errors raised by the `preview` command.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    /// The store could not be opened or read.
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
    /// An HTTP client for the providers could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),
    /// The alert could not be rendered.
    #[error("Formatting error: {0}")]
    Format(#[from] FormatError),
    /// The ad lookup failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    /// No watch with the given id is stored.
    #[error("Watch {0} not found")]
    WatchNotFound(WatchId),
}

/// Arguments of the `preview` command.
#[derive(Parser, Debug)]
pub struct PreviewArgs {
    /// Id of the persisted watch to render an alert for.
    #[arg(short, long)]
    watch_id: WatchId,
    /// USD value of the sample buy.
    #[arg(long, default_value = "1000")]
    usd: Decimal,
    /// ETH value of the sample buy.
    #[arg(long, default_value = "0.5")]
    eth: Decimal,
    /// Wallet shown as the buyer.
    #[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
    maker: String,
}

/// Renders one alert for a sample buy against live market data and prints
/// it instead of delivering it.
pub async fn execute(args: PreviewArgs, config_dir: Option<&str>) -> Result<(), Error> {
    let config = AppConfig::new(config_dir)?;
    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    store.run_migrations().await?;

    let watch =
        store.find_watch(args.watch_id).await?.ok_or(Error::WatchNotFound(args.watch_id))?;

    let pool = HttpClientPool::new(config.http_base_config.clone());
    let (enrichment, _) = market_data_providers(&config, &pool).await?;
    let formatter = NotificationFormatter::new(config.notification.clone())?;

    let event = TradeEvent {
        kind: TradeKind::Buy,
        maker: args.maker,
        tx_hash: format!("0x{}", "0".repeat(64)),
        amount0_out: None,
        amount1_out: None,
        base_total: args.eth,
        usd_total: args.usd,
    };
    if !watch.admits(&event) {
        tracing::warn!(min_buy = %watch.min_buy, "Sample buy is below the watch's minimum and would be filtered.");
    }

    let enriched = enrichment.enrich(&event, &watch).await;
    let ad_text = RepositoryAdProvider::new(Arc::clone(&store)).active_ad_text(Utc::now()).await?;
    let notification = formatter.format(&event, &enriched, &watch, ad_text.as_deref())?;

    println!("{}", notification.text);
    if let Some(image) = &notification.image {
        println!("\n[image: {image}]");
    }
    if !notification.degraded.is_empty() {
        println!("\n[degraded: {:?}]", notification.degraded);
    }

    store.close().await;
    Ok(())
}

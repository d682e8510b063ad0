use std::sync::Arc;

use buywatch::{
    cmd::{PreviewArgs, preview},
    config::AppConfig,
    persistence::SqliteStore,
    supervisor::Supervisor,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing `app.yaml`. Defaults to `configs`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resubscribes persisted watches and delivers alerts until stopped.
    Run,
    /// Renders a sample alert for one watch without delivering it.
    Preview(PreviewArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Run => run_supervisor(config_dir).await?,
        Commands::Preview(args) => preview(args, config_dir).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(database_url = %config.database_url, stream_url = %config.stream.url, "Configuration loaded.");

    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    store.run_migrations().await?;

    let supervisor = Supervisor::builder().config(config).store(store).build().await?;
    tracing::info!("Supervisor starting.");
    supervisor.run().await?;

    Ok(())
}

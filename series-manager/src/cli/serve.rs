//! Serve command - run the refresh scheduler and the query API

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::ingest::IngestionOrchestrator;
use crate::provider::binance::BinanceKlineClient;
use crate::query::SeriesQueryService;
use crate::scheduler::RefreshScheduler;
use crate::server::{self, AppState};
use crate::storage::PgSeriesStore;

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Bind address for API (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,

    /// Serve queries only, never refresh
    #[arg(long)]
    pub no_scheduler: bool,

    /// Skip table creation on start
    #[arg(long)]
    pub skip_migrations: bool,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = super::load_settings()?;
    let bind = args.bind.unwrap_or_else(|| settings.server.bind.clone());

    info!("Starting series manager service");
    info!("  Units: {}", settings.ingest.units.join(","));
    info!("  Scheduler: {}", !args.no_scheduler);
    info!("  Bind address: {}", bind);

    info!("Connecting to database...");
    let store = Arc::new(PgSeriesStore::from_settings(&settings.database).await?);
    if !args.skip_migrations {
        store.run_migrations().await?;
        info!("Database connected and migrations applied");
    }

    // Set up shutdown handling
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler_shutdown = shutdown_tx.subscribe();
    let server_shutdown = shutdown_tx.subscribe();

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        info!("Received shutdown signal");
        let _ = shutdown_tx_clone.send(());
    });

    let scheduler_handle = if args.no_scheduler {
        None
    } else {
        let source = Arc::new(BinanceKlineClient::new(&settings.provider.binance)?);
        let orchestrator = Arc::new(IngestionOrchestrator::new(
            store.clone(),
            source,
            settings.ingest.clone(),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(orchestrator, &settings.scheduler));
        Some(scheduler.spawn(scheduler_shutdown))
    };

    let query = SeriesQueryService::new(store, &settings.query);
    let served = server::serve(&bind, AppState::new(query), server_shutdown).await;

    // Stop the scheduler even when the server failed to start
    let _ = shutdown_tx.send(());
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    served?;
    info!("Series manager stopped");
    Ok(())
}

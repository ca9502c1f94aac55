//! Refresh command - run one ingestion cycle and print the report

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::ingest::IngestionOrchestrator;
use crate::provider::binance::BinanceKlineClient;
use crate::storage::PgSeriesStore;

/// Arguments for the refresh command
#[derive(Args)]
pub struct RefreshArgs {
    /// Track these instruments instead of the configured set (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub units: Option<Vec<String>>,

    /// Create tables before running
    #[arg(long)]
    pub migrate: bool,
}

/// Execute the refresh command
pub async fn execute(args: RefreshArgs) -> Result<()> {
    let mut settings = super::load_settings()?;
    if let Some(units) = args.units {
        settings.ingest.units = units.into_iter().map(|u| u.trim().to_uppercase()).collect();
        settings.validate()?;
    }

    let store = Arc::new(PgSeriesStore::from_settings(&settings.database).await?);
    if args.migrate {
        info!("Running migrations...");
        store.run_migrations().await?;
    }

    let source = Arc::new(BinanceKlineClient::new(&settings.provider.binance)?);
    let orchestrator = IngestionOrchestrator::new(store, source, settings.ingest);

    let report = orchestrator.run_refresh_cycle().await?;
    println!("{}", report);
    Ok(())
}

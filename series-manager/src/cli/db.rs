//! Database management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use crate::storage::{PgSeriesStore, SeriesStore};

/// Database subcommands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Create tables and indexes
    Migrate,
    /// Show per-unit statistics
    Stats(StatsArgs),
}

/// Arguments for stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Only show this unit
    #[arg(long, short)]
    pub unit: Option<String>,
}

/// Execute database commands
pub async fn execute(cmd: DbCommands) -> Result<()> {
    match cmd {
        DbCommands::Migrate => execute_migrate().await,
        DbCommands::Stats(args) => execute_stats(args).await,
    }
}

async fn execute_migrate() -> Result<()> {
    let settings = super::load_settings()?;
    let store = PgSeriesStore::from_settings(&settings.database).await?;

    info!("Running migrations...");
    store.run_migrations().await?;
    info!("Migrations completed");
    Ok(())
}

async fn execute_stats(args: StatsArgs) -> Result<()> {
    let settings = super::load_settings()?;
    let store = PgSeriesStore::from_settings(&settings.database).await?;

    info!("Fetching database statistics...");
    let stats = store.stats().await?;

    let selected: Vec<_> = stats
        .iter()
        .filter(|s| args.unit.as_deref().map_or(true, |u| s.unit == u))
        .collect();

    if selected.is_empty() {
        info!("No data");
        return Ok(());
    }

    info!("Database Statistics:");
    for s in selected {
        info!(
            "  {}: {} entries ({} interpolated), {} returns, {} - {}",
            s.unit,
            s.entries,
            s.interpolated,
            s.returns,
            s.earliest.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
            s.latest.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

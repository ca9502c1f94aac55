//! Command-line interface
//!
//! Provides CLI commands for the series manager.

pub mod db;
pub mod query;
pub mod refresh;
pub mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::Settings;

/// Series Manager CLI
#[derive(Parser)]
#[command(name = "series-manager")]
#[command(about = "Hourly price series ingestion, gap repair and rolling returns")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler and the query API
    Serve(serve::ServeArgs),
    /// Run a single refresh cycle
    Refresh(refresh::RefreshArgs),
    /// Database operations
    #[command(subcommand)]
    Db(db::DbCommands),
    /// Read persisted entries and returns
    #[command(subcommand)]
    Query(query::QueryCommands),
}

/// Load and validate settings
pub(crate) fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings.validate()?;
    debug!(units = ?settings.ingest.units, "Configuration loaded");
    Ok(settings)
}

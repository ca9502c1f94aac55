//! Series Manager CLI
//!
//! Provides commands for:
//! - `serve`: Run the refresh scheduler and the query API
//! - `refresh`: Run one refresh cycle
//! - `db`: Database operations
//! - `query`: Read persisted entries and returns

use anyhow::Result;
use clap::Parser;

use series_common::logging::{init_logging, LogConfig};
use series_manager::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    init_logging(LogConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Serve(args) => {
            series_manager::cli::serve::execute(args).await?;
        }
        Commands::Refresh(args) => {
            series_manager::cli::refresh::execute(args).await?;
        }
        Commands::Db(cmd) => {
            series_manager::cli::db::execute(cmd).await?;
        }
        Commands::Query(cmd) => {
            series_manager::cli::query::execute(cmd).await?;
        }
    }

    Ok(())
}

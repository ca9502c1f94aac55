//! Query commands - print persisted records as JSON

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use crate::query::SeriesQueryService;
use crate::storage::PgSeriesStore;

/// Query subcommands
#[derive(Subcommand)]
pub enum QueryCommands {
    /// Most recent hourly entries
    Entries(QueryArgs),
    /// Most recent daily rolling returns
    Returns(QueryArgs),
    /// Units with persisted entries
    Units,
}

/// Arguments for entries/returns queries
#[derive(Args)]
pub struct QueryArgs {
    /// Instrument symbol (e.g., BTCUSDT)
    #[arg(long, short)]
    pub unit: String,

    /// Number of records, newest first
    #[arg(long, short)]
    pub limit: Option<usize>,

    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Execute query commands
pub async fn execute(cmd: QueryCommands) -> Result<()> {
    let settings = super::load_settings()?;
    let store = Arc::new(PgSeriesStore::from_settings(&settings.database).await?);
    let service = SeriesQueryService::new(store, &settings.query);

    match cmd {
        QueryCommands::Entries(args) => {
            let rows = service.entries(&args.unit, args.limit).await;
            print_json(&rows, args.pretty)
        }
        QueryCommands::Returns(args) => {
            let rows = service.returns(&args.unit, args.limit).await;
            print_json(&rows, args.pretty)
        }
        QueryCommands::Units => print_json(&service.units().await, false),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

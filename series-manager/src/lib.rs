//! # Series Manager
//!
//! Hourly price series ingestion for a fixed set of instruments.
//!
//! ## Features
//!
//! - **Incremental refresh**: each instrument resumes from its newest persisted hour
//! - **Gap repair**: missing hours are synthesized and filled by polynomial interpolation
//! - **Rolling returns**: a daily mean hourly percentage change per instrument
//! - **Atomic cycles**: one store transaction per refresh, rolled back on any failure
//!
//! ## Architecture
//!
//! A [`provider::KlineSource`] delivers raw hourly klines. The [`pipeline`]
//! stages are pure functions that align, augment and fill them. The
//! [`ingest::IngestionOrchestrator`] drives the stages against a
//! [`storage::SeriesStore`], and the [`query::SeriesQueryService`] serves the
//! committed data over HTTP and the CLI.

pub mod cli;
pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod scheduler;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::Settings;
pub use ingest::{CycleReport, IngestError, IngestionOrchestrator, UnitReport};
pub use provider::{KlineSource, ProviderError, ProviderInfo, ProviderResult};
pub use query::SeriesQueryService;
pub use scheduler::RefreshScheduler;
pub use storage::{MemorySeriesStore, PgSeriesStore, SeriesStore, SeriesTransaction, StoreError};

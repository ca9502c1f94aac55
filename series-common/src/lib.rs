// series-common: shared types for the hourly price series pipeline
// Used by series-manager (ingestion, storage, query serving)

pub mod data;
pub mod error;
pub mod logging;
pub mod retry;

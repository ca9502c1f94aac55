//! Refresh cycle orchestration
//!
//! One refresh cycle fetches, repairs and persists new hourly data for
//! every instrument that needs it, then derives the daily rolling
//! returns, all inside a single store transaction.

mod error;
mod orchestrator;
mod report;

pub use error::*;
pub use orchestrator::*;
pub use report::*;

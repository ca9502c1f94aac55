//! Refresh cycle scheduling
//!
//! Triggers the ingestion cycle once at start and then on a recurring
//! schedule. Cycles are driven from one task, so they never overlap.

mod cron;
mod refresh;

pub use cron::*;
pub use refresh::*;

//! Storage layer for the hourly series
//!
//! Two tables back the pipeline: `entries` (hourly samples, unique on
//! `(unit, datetime)`) and `rolling_returns` (unique on `(date, unit)`).
//! All writes of a refresh cycle go through one [`SeriesTransaction`].

mod memory;
mod postgres;
mod repository;

pub use memory::*;
pub use postgres::*;
pub use repository::*;

//! Domain data for the hourly price series
//!
//! A series moves through three shapes:
//! - [`RawKline`]: what the market-data source delivers
//! - [`PendingSample`]: one hourly slot, possibly a placeholder with unknown prices
//! - [`Sample`]: a filled slot ready for persistence
//!
//! [`ContextSample`] rows only ever live inside a [`WindowRow`] during
//! interpolation and are never persisted.

pub mod time;
pub mod types;

pub use time::{hours_between, is_day_boundary, truncate_to_hour, ONE_DAY, ONE_HOUR};
pub use types::{ContextSample, DailyReturn, PendingSample, RawKline, Sample, WindowRow};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::time::truncate_to_hour;

// =================================================================
// Source data
// =================================================================

/// One raw hourly kline as delivered by the market-data source.
///
/// Only the fields the pipeline consumes are kept; volume and the
/// high/low range are dropped by the provider parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RawKline {
    /// Kline open time in milliseconds since the Unix epoch
    pub open_time_ms: i64,
    /// Opening price
    pub open: Decimal,
    /// Closing price
    pub close: Decimal,
}

impl RawKline {
    pub fn new(open_time_ms: i64, open: Decimal, close: Decimal) -> Self {
        Self {
            open_time_ms,
            open,
            close,
        }
    }

    /// Open time as a UTC timestamp, `None` when out of chrono's range
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time_ms)
    }

    /// Open time truncated to the top of its hour
    pub fn hour(&self) -> Option<DateTime<Utc>> {
        self.open_time().map(truncate_to_hour)
    }
}

// =================================================================
// Working set
// =================================================================

/// One hourly slot of an instrument's series before interpolation.
///
/// Placeholders carry no prices until the interpolator fills them.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSample {
    pub unit: String,
    /// Always truncated to the top of the hour
    pub timestamp: DateTime<Utc>,
    pub opening: Option<Decimal>,
    pub closing: Option<Decimal>,
    pub synthetic: bool,
}

impl PendingSample {
    /// A slot backed by a fetched kline
    pub fn observed(
        unit: impl Into<String>,
        timestamp: DateTime<Utc>,
        opening: Decimal,
        closing: Decimal,
    ) -> Self {
        Self {
            unit: unit.into(),
            timestamp: truncate_to_hour(timestamp),
            opening: Some(opening),
            closing: Some(closing),
            synthetic: false,
        }
    }

    /// A gap placeholder with unknown prices
    pub fn placeholder(unit: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            unit: unit.into(),
            timestamp: truncate_to_hour(timestamp),
            opening: None,
            closing: None,
            synthetic: true,
        }
    }
}

/// Price-only echo of a persisted real sample.
///
/// Has no unit and no timestamp, so it can never be mistaken for a row
/// of the window being ingested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSample {
    pub opening: Decimal,
    pub closing: Decimal,
}

impl From<&Sample> for ContextSample {
    fn from(sample: &Sample) -> Self {
        Self {
            opening: sample.opening,
            closing: sample.closing,
        }
    }
}

/// A row of the interpolation working set
#[derive(Debug, Clone, PartialEq)]
pub enum WindowRow {
    /// Row of the window being ingested
    Slot(PendingSample),
    /// Fitting-only row borrowed from persisted history
    Context(ContextSample),
}

impl WindowRow {
    pub fn opening(&self) -> Option<Decimal> {
        match self {
            WindowRow::Slot(slot) => slot.opening,
            WindowRow::Context(ctx) => Some(ctx.opening),
        }
    }

    pub fn closing(&self) -> Option<Decimal> {
        match self {
            WindowRow::Slot(slot) => slot.closing,
            WindowRow::Context(ctx) => Some(ctx.closing),
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, WindowRow::Context(_))
    }
}

// =================================================================
// Persisted records: field names match the table columns
// =================================================================

/// One persisted hourly sample (`entries` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Store-assigned row id, absent before insertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub unit: String,
    pub datetime: DateTime<Utc>,
    pub opening: Decimal,
    pub closing: Decimal,
    /// True when the row was synthesized to fill a gap
    pub interpolated: bool,
}

impl Sample {
    pub fn new(
        unit: impl Into<String>,
        datetime: DateTime<Utc>,
        opening: Decimal,
        closing: Decimal,
        interpolated: bool,
    ) -> Self {
        Self {
            id: None,
            unit: unit.into(),
            datetime,
            opening,
            closing,
            interpolated,
        }
    }
}

/// Daily rolling return (`rolling_returns` table)
///
/// Each value is the mean hourly percentage change over the 24 hours
/// ending at the start of `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub opening: Decimal,
    pub closing: Decimal,
    pub unit: String,
}

impl DailyReturn {
    pub fn new(
        unit: impl Into<String>,
        date: NaiveDate,
        opening: Decimal,
        closing: Decimal,
    ) -> Self {
        Self {
            id: None,
            date,
            opening,
            closing,
            unit: unit.into(),
        }
    }
}

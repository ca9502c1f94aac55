//! Hour and day arithmetic for the hourly series (UTC throughout)

use chrono::{DateTime, Duration, Timelike, Utc};

/// Sampling interval of the series
pub const ONE_HOUR: Duration = Duration::hours(1);

/// Length of a rolling-return window
pub const ONE_DAY: Duration = Duration::days(1);

const SECONDS_PER_HOUR: i64 = 3600;

/// Truncate a timestamp to the top of its hour
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Whether the timestamp is a start-of-day boundary
pub fn is_day_boundary(ts: DateTime<Utc>) -> bool {
    ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0
}

/// Whole hours from `prev` to `curr`, rounded to the nearest hour
///
/// Negative when `curr` precedes `prev`.
pub fn hours_between(prev: DateTime<Utc>, curr: DateTime<Utc>) -> i64 {
    let minutes = (curr - prev).num_minutes();
    (minutes + 30).div_euclid(60)
}

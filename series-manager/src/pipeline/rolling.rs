//! Daily rolling return
//!
//! For a day boundary `D`, the window is every persisted sample with
//! `D - 24h < datetime <= D`. Each value is the sum of hour-over-hour
//! percentage changes divided by the number of rows in the window (not
//! the number of changes), rounded to six decimal places.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use series_common::data::{DailyReturn, Sample, ONE_DAY};
use series_common::error::{ErrorCategory, ErrorClassification};

/// Decimal places kept on persisted returns
pub const RETURN_DP: u32 = 6;

/// Rolling return errors
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RollingReturnError {
    /// A zero base price makes the percentage change undefined
    #[error("Zero {field} price for {unit} at {at}")]
    DivideByZero {
        unit: String,
        field: &'static str,
        at: DateTime<Utc>,
    },

    /// Fewer than two rows, so no change can be measured
    #[error("Window for {unit} ending {day} has {rows} row(s), need at least 2")]
    InsufficientRows {
        unit: String,
        day: DateTime<Utc>,
        rows: usize,
    },

    /// Decimal arithmetic left the representable range
    #[error("Arithmetic overflow computing {field} return for {unit}")]
    Overflow { unit: String, field: &'static str },
}

impl ErrorClassification for RollingReturnError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

/// `(exclusive start, inclusive end)` of the window ending at `day`
pub fn window_bounds(day: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (day - ONE_DAY, day)
}

/// Compute the rolling return for `unit` at the boundary `day`.
///
/// `window` must be ascending by datetime.
pub fn compute_daily_return(
    unit: &str,
    day: DateTime<Utc>,
    window: &[Sample],
) -> Result<DailyReturn, RollingReturnError> {
    if window.len() < 2 {
        return Err(RollingReturnError::InsufficientRows {
            unit: unit.to_string(),
            day,
            rows: window.len(),
        });
    }

    let opening = average_change(unit, "opening", window, |s| s.opening)?;
    let closing = average_change(unit, "closing", window, |s| s.closing)?;

    Ok(DailyReturn::new(unit, day.date_naive(), opening, closing))
}

fn average_change(
    unit: &str,
    field: &'static str,
    window: &[Sample],
    price: impl Fn(&Sample) -> Decimal,
) -> Result<Decimal, RollingReturnError> {
    let overflow = || RollingReturnError::Overflow {
        unit: unit.to_string(),
        field,
    };
    let hundred = Decimal::ONE_HUNDRED;

    let mut total = Decimal::ZERO;
    for pair in window.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let base = price(prev);
        if base.is_zero() {
            return Err(RollingReturnError::DivideByZero {
                unit: unit.to_string(),
                field,
                at: prev.datetime,
            });
        }

        let change = price(curr)
            .checked_sub(base)
            .and_then(|d| d.checked_mul(hundred))
            .and_then(|d| d.checked_div(base))
            .ok_or_else(overflow)?;
        total = total.checked_add(change).ok_or_else(overflow)?;
    }

    let average = total
        .checked_div(Decimal::from(window.len()))
        .ok_or_else(overflow)?;
    Ok(average.round_dp(RETURN_DP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn window(prices: &[(Decimal, Decimal)]) -> Vec<Sample> {
        let first = day() - chrono::Duration::hours(prices.len() as i64 - 1);
        prices
            .iter()
            .enumerate()
            .map(|(i, (o, c))| {
                Sample::new(
                    "BTCUSDT",
                    first + chrono::Duration::hours(i as i64),
                    *o,
                    *c,
                    false,
                )
            })
            .collect()
    }

    #[test]
    fn test_average_divides_by_row_count() {
        let rows = window(&[
            (dec!(100), dec!(100)),
            (dec!(110), dec!(105)),
            (dec!(99), dec!(126)),
        ]);

        let ret = compute_daily_return("BTCUSDT", day(), &rows).unwrap();

        let expected_open = ((dec!(110) - dec!(100)) * dec!(100) / dec!(100)
            + (dec!(99) - dec!(110)) * dec!(100) / dec!(110))
            / dec!(3);
        assert_eq!(ret.opening, expected_open.round_dp(6));
        // (5 + 20) / 3
        assert_eq!(ret.closing, dec!(8.333333));
        assert_eq!(ret.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(ret.unit, "BTCUSDT");
    }

    #[test]
    fn test_two_rows() {
        let rows = window(&[(dec!(200), dec!(50)), (dec!(201), dec!(49))]);
        let ret = compute_daily_return("BTCUSDT", day(), &rows).unwrap();
        assert_eq!(ret.opening, dec!(0.25));
        assert_eq!(ret.closing, dec!(-1));
    }

    #[test]
    fn test_zero_base_price() {
        let rows = window(&[(dec!(100), dec!(0)), (dec!(101), dec!(1))]);
        let err = compute_daily_return("BTCUSDT", day(), &rows).unwrap_err();
        assert!(matches!(
            err,
            RollingReturnError::DivideByZero {
                field: "closing",
                ..
            }
        ));
    }

    #[test]
    fn test_single_row_window() {
        let rows = window(&[(dec!(100), dec!(100))]);
        let err = compute_daily_return("BTCUSDT", day(), &rows).unwrap_err();
        assert!(matches!(
            err,
            RollingReturnError::InsufficientRows { rows: 1, .. }
        ));
        assert!(compute_daily_return("BTCUSDT", day(), &[]).is_err());
    }

    #[test]
    fn test_window_bounds() {
        let (start, end) = window_bounds(day());
        assert_eq!(end, day());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }
}

//! Hour alignment and gap synthesis
//!
//! Turns the raw, possibly gappy kline feed into one row per hour.
//! Missing hours become placeholders with unknown prices.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use series_common::data::{hours_between, is_day_boundary, PendingSample, RawKline, ONE_HOUR};

/// Hour-aligned window for one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    pub unit: String,
    /// Contiguous hourly rows, ascending
    pub rows: Vec<PendingSample>,
    /// At least one placeholder was synthesized
    pub has_synthetic: bool,
    /// Row timestamps that fall on a UTC midnight
    pub day_boundaries: Vec<DateTime<Utc>>,
}

impl NormalizedWindow {
    fn empty(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            rows: Vec::new(),
            has_synthetic: false,
            day_boundaries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn synthetic_count(&self) -> usize {
        self.rows.iter().filter(|r| r.synthetic).count()
    }
}

/// Normalize the klines fetched for `unit` after `start`.
///
/// Klines whose hour is at or before `start` are skipped, so the persisted
/// watermark hour is never ingested twice. Two klines in the same hour collapse into one
/// row holding the later kline's prices.
pub fn normalize(unit: &str, klines: &[RawKline], start: DateTime<Utc>) -> NormalizedWindow {
    let mut window = NormalizedWindow::empty(unit);

    let mut fresh = klines
        .iter()
        .filter_map(|k| k.hour().map(|t| (t, k)))
        .skip_while(|(t, _)| *t <= start);

    let Some((first_time, first)) = fresh.next() else {
        debug!(unit, "No klines after watermark");
        return window;
    };

    let seed = PendingSample::observed(unit, first_time, first.open, first.close);
    let mut previous = seed.timestamp;
    window.rows.push(seed);

    for (time, kline) in fresh {
        let current = PendingSample::observed(unit, time, kline.open, kline.close);
        let gap_hours = hours_between(previous, current.timestamp);

        if gap_hours < 0 {
            warn!(unit, at = %current.timestamp, "Out-of-order kline skipped");
            continue;
        }

        if gap_hours == 0 {
            if let Some(last) = window.rows.last_mut() {
                *last = current;
            }
            continue;
        }

        for _ in 1..gap_hours {
            previous += ONE_HOUR;
            window.rows.push(PendingSample::placeholder(unit, previous));
            window.has_synthetic = true;
        }

        previous = current.timestamp;
        window.rows.push(current);
    }

    window.day_boundaries = window
        .rows
        .iter()
        .map(|r| r.timestamp)
        .filter(|ts| is_day_boundary(*ts))
        .collect();

    debug!(
        unit,
        rows = window.rows.len(),
        synthetic = window.synthetic_count(),
        day_boundaries = window.day_boundaries.len(),
        "Normalized window"
    );

    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn kline(ts: DateTime<Utc>, price: u32) -> RawKline {
        RawKline::new(ts.timestamp_millis(), price.into(), price.into())
    }

    #[test]
    fn test_gap_synthesis() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let klines = vec![kline(at(0), 100), kline(at(1), 101), kline(at(4), 104)];

        let window = normalize("BTCUSDT", &klines, start);
        let hours: Vec<_> = window.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(hours, vec![at(0), at(1), at(2), at(3), at(4)]);

        let synthetic: Vec<_> = window.rows.iter().map(|r| r.synthetic).collect();
        assert_eq!(synthetic, vec![false, false, true, true, false]);
        assert!(window.rows[2].opening.is_none());
        assert!(window.rows[3].closing.is_none());
        assert!(window.has_synthetic);
        assert_eq!(window.synthetic_count(), 2);
    }

    #[test]
    fn test_no_gap_no_synthesis() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap();
        let klines: Vec<_> = (0..5).map(|h| kline(at(h), 100 + h)).collect();

        let window = normalize("BTCUSDT", &klines, start);
        assert_eq!(window.len(), 5);
        assert!(!window.has_synthetic);
        assert!(window.rows.iter().all(|r| !r.synthetic));
    }

    #[test]
    fn test_watermark_row_excluded() {
        let klines = vec![kline(at(3), 100), kline(at(4), 101), kline(at(5), 102)];

        let window = normalize("ETHUSDT", &klines, at(3));
        assert_eq!(window.len(), 2);
        assert_eq!(window.rows[0].timestamp, at(4));
        assert_eq!(window.rows[0].opening, Some(dec!(101)));
    }

    #[test]
    fn test_kline_inside_watermark_hour_excluded() {
        let half_past = Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 0).unwrap();
        let klines = vec![kline(half_past, 100), kline(at(4), 101)];

        let window = normalize("ETHUSDT", &klines, at(3));
        let hours: Vec<_> = window.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(hours, vec![at(4)]);
    }

    #[test]
    fn test_nothing_after_watermark_is_empty() {
        let klines = vec![kline(at(1), 100), kline(at(2), 101)];
        let window = normalize("ETHUSDT", &klines, at(2));
        assert!(window.is_empty());
        assert!(!window.has_synthetic);
        assert!(window.day_boundaries.is_empty());
    }

    #[test]
    fn test_same_hour_later_kline_wins() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let half_past = Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap();
        let klines = vec![
            kline(at(0), 100),
            kline(at(1), 101),
            kline(half_past, 150),
            kline(at(2), 102),
        ];

        let window = normalize("BTCUSDT", &klines, start);
        let hours: Vec<_> = window.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(hours, vec![at(0), at(1), at(2)]);
        assert_eq!(window.rows[1].opening, Some(dec!(150)));
        assert!(!window.has_synthetic);
    }

    #[test]
    fn test_day_boundaries_include_first_and_synthetic_rows() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap();

        let klines = vec![kline(at(0), 100), kline(before, 101), kline(after, 102)];
        let window = normalize("BTCUSDT", &klines, start);

        assert_eq!(window.day_boundaries, vec![at(0), day2]);
        let midnight = window.rows.iter().find(|r| r.timestamp == day2).unwrap();
        assert!(midnight.synthetic);
    }
}

//! Per-instrument fetch start points

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use series_common::data::truncate_to_hour;

/// Resolve the fetch start for every instrument that needs a refresh.
///
/// `latest` holds the newest persisted sample time per instrument. An
/// instrument whose latest sample is older than the current hour starts
/// from that sample; one that is already current is left out. Configured
/// `units` with no history start from `default_start`.
///
/// The result is ordered by instrument name.
pub fn resolve_watermarks(
    latest: &HashMap<String, DateTime<Utc>>,
    units: &[String],
    default_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BTreeMap<String, DateTime<Utc>> {
    let current_hour = truncate_to_hour(now);

    let mut watermarks: BTreeMap<String, DateTime<Utc>> = latest
        .iter()
        .filter(|(_, ts)| **ts < current_hour)
        .map(|(unit, ts)| (unit.clone(), *ts))
        .collect();

    for unit in units {
        if !latest.contains_key(unit) {
            watermarks.insert(unit.clone(), default_start);
        }
    }

    watermarks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn units() -> Vec<String> {
        vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
    }

    #[test]
    fn test_missing_units_get_default_start() {
        let default_start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 0).unwrap();

        let watermarks = resolve_watermarks(&HashMap::new(), &units(), default_start, now);
        assert_eq!(watermarks.len(), 2);
        assert_eq!(watermarks["BTCUSDT"], default_start);
        assert_eq!(watermarks["ETHUSDT"], default_start);
    }

    #[test]
    fn test_stale_unit_starts_at_latest() {
        let default_start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 0).unwrap();
        let stale = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let current = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let latest = HashMap::from([
            ("BTCUSDT".to_string(), stale),
            ("ETHUSDT".to_string(), current),
        ]);

        let watermarks = resolve_watermarks(&latest, &units(), default_start, now);
        assert_eq!(watermarks.len(), 1);
        assert_eq!(watermarks["BTCUSDT"], stale);
        assert!(!watermarks.contains_key("ETHUSDT"));
    }

    #[test]
    fn test_untracked_persisted_unit_still_refreshed() {
        let default_start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let stale = Utc.with_ymd_and_hms(2024, 4, 30, 23, 0, 0).unwrap();

        let latest = HashMap::from([("SOLUSDT".to_string(), stale)]);
        let watermarks = resolve_watermarks(&latest, &units(), default_start, now);

        let keys: Vec<_> = watermarks.keys().cloned().collect();
        assert_eq!(keys, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(watermarks["SOLUSDT"], stale);
    }
}

//! Refresh cycle outcome

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// What one cycle did for one instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: String,
    /// Fetch start (the persisted watermark or the default start)
    pub start: DateTime<Utc>,
    /// Klines delivered by the source
    pub fetched: usize,
    /// Samples inserted
    pub persisted: usize,
    /// Inserted samples whose prices were interpolated
    pub synthetic: usize,
    /// Persisted rows borrowed as fitting context
    pub context_rows: usize,
    pub returns_written: usize,
    /// Day boundaries whose window was too short for a return
    pub returns_skipped: usize,
}

impl UnitReport {
    pub(crate) fn new(unit: &str, start: DateTime<Utc>) -> Self {
        Self {
            unit: unit.to_string(),
            start,
            fetched: 0,
            persisted: 0,
            synthetic: 0,
            context_rows: 0,
            returns_written: 0,
            returns_skipped: 0,
        }
    }
}

/// Outcome of a committed refresh cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Wall clock the cycle ran against
    pub now: DateTime<Utc>,
    /// Refreshed instruments, by name
    pub units: Vec<UnitReport>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn samples_persisted(&self) -> usize {
        self.units.iter().map(|u| u.persisted).sum()
    }

    pub fn returns_written(&self) -> usize {
        self.units.iter().map(|u| u.returns_written).sum()
    }

    pub fn unit(&self, unit: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.unit == unit)
    }

    /// Nothing was due
    pub fn is_noop(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Cycle {} finished in {:.2?}: {} samples, {} returns",
            self.cycle_id,
            self.duration,
            self.samples_persisted(),
            self.returns_written()
        )?;
        if self.units.is_empty() {
            return write!(f, "  all instruments up to date");
        }
        for u in &self.units {
            writeln!(
                f,
                "  {:<12} from {}  fetched={} persisted={} synthetic={} context={} returns={} skipped={}",
                u.unit,
                u.start.format("%Y-%m-%d %H:%M"),
                u.fetched,
                u.persisted,
                u.synthetic,
                u.context_rows,
                u.returns_written,
                u.returns_skipped
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_totals_and_display() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut btc = UnitReport::new("BTCUSDT", start);
        btc.persisted = 24;
        btc.returns_written = 1;
        let mut eth = UnitReport::new("ETHUSDT", start);
        eth.persisted = 10;

        let report = CycleReport {
            cycle_id: Uuid::new_v4(),
            now: start,
            units: vec![btc, eth],
            duration: Duration::from_millis(12),
        };

        assert_eq!(report.samples_persisted(), 34);
        assert_eq!(report.returns_written(), 1);
        assert!(!report.is_noop());
        assert_eq!(report.unit("ETHUSDT").map(|u| u.persisted), Some(10));

        let text = report.to_string();
        assert!(text.contains("34 samples"));
        assert!(text.contains("BTCUSDT"));
    }
}

//! In-memory store
//!
//! Transactions work on a private copy of the committed state and swap
//! it in on commit, so readers only ever see committed data. One
//! transaction may be open at a time; `begin` waits for the previous one
//! to finish. Failure hooks let tests break reads and writes on demand.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use series_common::data::{DailyReturn, Sample};
use series_common::error::DatabaseError;

use super::{SeriesStore, SeriesTransaction, StoreResult, UnitStats};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    samples: BTreeMap<(String, DateTime<Utc>), Sample>,
    returns: BTreeMap<(String, NaiveDate), DailyReturn>,
}

impl MemoryState {
    fn unit_samples<'a>(&'a self, unit: &'a str) -> impl DoubleEndedIterator<Item = &'a Sample> {
        self.samples
            .range((unit.to_string(), DateTime::<Utc>::MIN_UTC)..=(unit.to_string(), DateTime::<Utc>::MAX_UTC))
            .map(|(_, s)| s)
    }

    fn unit_returns<'a>(
        &'a self,
        unit: &'a str,
    ) -> impl DoubleEndedIterator<Item = &'a DailyReturn> {
        self.returns
            .range((unit.to_string(), NaiveDate::MIN)..=(unit.to_string(), NaiveDate::MAX))
            .map(|(_, r)| r)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_begin: AtomicBool,
    fail_sample_inserts: AtomicBool,
    fail_return_inserts: AtomicBool,
    failing_reads: AtomicU32,
}

impl Faults {
    fn take_read_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Transactional in-memory series store
#[derive(Clone, Default)]
pub struct MemorySeriesStore {
    committed: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<Faults>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `begin` fail with a connection error
    pub fn fail_begin(&self, fail: bool) {
        self.faults.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make sample inserts fail with a write error
    pub fn fail_sample_inserts(&self, fail: bool) {
        self.faults.fail_sample_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make return inserts fail with a write error
    pub fn fail_return_inserts(&self, fail: bool) {
        self.faults.fail_return_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` committed-data reads with a transient error
    pub fn fail_next_reads(&self, count: u32) {
        self.faults.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Committed samples for `unit`, ascending
    pub fn samples(&self, unit: &str) -> Vec<Sample> {
        self.committed.read().unit_samples(unit).cloned().collect()
    }

    /// Committed returns for `unit`, ascending by date
    pub fn returns(&self, unit: &str) -> Vec<DailyReturn> {
        self.committed.read().unit_returns(unit).cloned().collect()
    }

    /// Total committed samples across units
    pub fn sample_count(&self) -> usize {
        self.committed.read().samples.len()
    }

    /// Total committed returns across units
    pub fn return_count(&self) -> usize {
        self.committed.read().returns.len()
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.faults.take_read_failure() {
            return Err(DatabaseError::Connection("injected read failure".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl SeriesStore for MemorySeriesStore {
    async fn begin(&self) -> StoreResult<Box<dyn SeriesTransaction>> {
        if self.faults.fail_begin.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connection("injected connection failure".to_string()).into());
        }

        let guard = self.writer.clone().lock_owned().await;
        let working = self.committed.read().clone();

        Ok(Box::new(MemoryTransaction {
            working,
            committed: Arc::clone(&self.committed),
            faults: Arc::clone(&self.faults),
            _guard: guard,
        }))
    }

    async fn recent_samples(&self, unit: &str, limit: usize) -> StoreResult<Vec<Sample>> {
        self.check_read()?;
        Ok(self
            .committed
            .read()
            .unit_samples(unit)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_returns(&self, unit: &str, limit: usize) -> StoreResult<Vec<DailyReturn>> {
        self.check_read()?;
        Ok(self
            .committed
            .read()
            .unit_returns(unit)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn units(&self) -> StoreResult<Vec<String>> {
        self.check_read()?;
        let state = self.committed.read();
        let mut units: Vec<String> = state.samples.keys().map(|(u, _)| u.clone()).collect();
        units.dedup();
        Ok(units)
    }

    async fn stats(&self) -> StoreResult<Vec<UnitStats>> {
        self.check_read()?;
        let state = self.committed.read();

        let mut stats: BTreeMap<&str, UnitStats> = BTreeMap::new();
        for sample in state.samples.values() {
            let entry = stats.entry(sample.unit.as_str()).or_insert_with(|| UnitStats {
                unit: sample.unit.clone(),
                entries: 0,
                interpolated: 0,
                returns: 0,
                earliest: None,
                latest: None,
            });
            entry.entries += 1;
            if sample.interpolated {
                entry.interpolated += 1;
            }
            entry.earliest = Some(entry.earliest.map_or(sample.datetime, |t| t.min(sample.datetime)));
            entry.latest = Some(entry.latest.map_or(sample.datetime, |t| t.max(sample.datetime)));
        }
        for ret in state.returns.values() {
            if let Some(entry) = stats.get_mut(ret.unit.as_str()) {
                entry.returns += 1;
            }
        }

        Ok(stats.into_values().collect())
    }
}

/// Working copy of the store for one unit of work
pub struct MemoryTransaction {
    working: MemoryState,
    committed: Arc<RwLock<MemoryState>>,
    faults: Arc<Faults>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl SeriesTransaction for MemoryTransaction {
    async fn latest_sample_times(&mut self) -> StoreResult<HashMap<String, DateTime<Utc>>> {
        let mut latest = HashMap::new();
        for (unit, datetime) in self.working.samples.keys() {
            // Keys are ordered by (unit, datetime), so the last write wins.
            latest.insert(unit.clone(), *datetime);
        }
        Ok(latest)
    }

    async fn recent_real_samples(
        &mut self,
        unit: &str,
        limit: usize,
    ) -> StoreResult<Vec<Sample>> {
        Ok(self
            .working
            .unit_samples(unit)
            .rev()
            .filter(|s| !s.interpolated)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_samples(&mut self, samples: &[Sample]) -> StoreResult<usize> {
        if self.faults.fail_sample_inserts.load(Ordering::SeqCst) {
            return Err(DatabaseError::Write("injected entries insert failure".to_string()).into());
        }

        let mut staged = BTreeMap::new();
        for sample in samples {
            let key = (sample.unit.clone(), sample.datetime);
            if self.working.samples.contains_key(&key) || staged.contains_key(&key) {
                return Err(DatabaseError::duplicate(
                    "entries",
                    format!("{}@{}", sample.unit, sample.datetime.to_rfc3339()),
                )
                .into());
            }
            staged.insert(key, sample.clone());
        }

        let inserted = staged.len();
        self.working.samples.extend(staged);
        Ok(inserted)
    }

    async fn samples_in_window(
        &mut self,
        unit: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Sample>> {
        Ok(self
            .working
            .unit_samples(unit)
            .filter(|s| s.datetime > after && s.datetime <= until)
            .cloned()
            .collect())
    }

    async fn insert_returns(&mut self, returns: &[DailyReturn]) -> StoreResult<usize> {
        if self.faults.fail_return_inserts.load(Ordering::SeqCst) {
            return Err(
                DatabaseError::Write("injected rolling_returns insert failure".to_string()).into(),
            );
        }

        let mut staged = BTreeMap::new();
        for ret in returns {
            let key = (ret.unit.clone(), ret.date);
            if self.working.returns.contains_key(&key) || staged.contains_key(&key) {
                return Err(
                    DatabaseError::duplicate("rolling_returns", format!("{}@{}", ret.unit, ret.date))
                        .into(),
                );
            }
            staged.insert(key, ret.clone());
        }

        let inserted = staged.len();
        self.working.returns.extend(staged);
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            working,
            committed,
            _guard,
            ..
        } = *self;
        *committed.write() = working;
        drop(_guard);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn sample(unit: &str, h: u32, interpolated: bool) -> Sample {
        Sample::new(unit, at(h), dec!(100), dec!(101), interpolated)
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[sample("BTCUSDT", 0, false), sample("BTCUSDT", 1, true)])
            .await
            .unwrap();

        assert!(store.recent_samples("BTCUSDT", 10).await.unwrap().is_empty());
        tx.commit().await.unwrap();

        let recent = store.recent_samples("BTCUSDT", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].datetime, at(1));
        assert_eq!(store.units().await.unwrap(), vec!["BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[sample("BTCUSDT", 0, false)]).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.sample_count(), 0);
        // The writer slot is free again
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_sample_rejected() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[sample("BTCUSDT", 0, false)]).await.unwrap();

        let err = tx
            .insert_samples(&[sample("BTCUSDT", 1, false), sample("BTCUSDT", 0, false)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate key in entries"));

        // The failed call inserted nothing
        let window = tx.samples_in_window("BTCUSDT", at(0) - chrono::Duration::hours(1), at(5)).await.unwrap();
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_return_rejected() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        let date = at(0).date_naive();
        let ret = DailyReturn::new("BTCUSDT", date, dec!(0.1), dec!(0.2));

        assert_eq!(tx.insert_returns(&[ret.clone()]).await.unwrap(), 1);
        assert!(tx.insert_returns(&[ret]).await.is_err());
    }

    #[tokio::test]
    async fn test_transaction_reads() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[
            sample("BTCUSDT", 0, false),
            sample("BTCUSDT", 1, true),
            sample("BTCUSDT", 2, false),
            sample("ETHUSDT", 5, false),
        ])
        .await
        .unwrap();

        let latest = tx.latest_sample_times().await.unwrap();
        assert_eq!(latest["BTCUSDT"], at(2));
        assert_eq!(latest["ETHUSDT"], at(5));

        let real = tx.recent_real_samples("BTCUSDT", 10).await.unwrap();
        let hours: Vec<_> = real.iter().map(|s| s.datetime).collect();
        assert_eq!(hours, vec![at(2), at(0)]);

        let window = tx.samples_in_window("BTCUSDT", at(0), at(2)).await.unwrap();
        let hours: Vec<_> = window.iter().map(|s| s.datetime).collect();
        assert_eq!(hours, vec![at(1), at(2)]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemorySeriesStore::new();
        store.fail_next_reads(2);
        assert!(store.units().await.is_err());
        assert!(store.recent_samples("BTCUSDT", 1).await.is_err());
        assert!(store.units().await.is_ok());

        store.fail_return_inserts(true);
        let mut tx = store.begin().await.unwrap();
        let ret = DailyReturn::new("BTCUSDT", at(0).date_naive(), dec!(0), dec!(0));
        assert!(tx.insert_returns(&[ret]).await.is_err());
        tx.rollback().await.unwrap();

        store.fail_begin(true);
        assert!(store.begin().await.is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemorySeriesStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[sample("BTCUSDT", 3, false), sample("BTCUSDT", 4, true)])
            .await
            .unwrap();
        tx.insert_returns(&[DailyReturn::new("BTCUSDT", at(0).date_naive(), dec!(1), dec!(1))])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].entries, 2);
        assert_eq!(stats[0].interpolated, 1);
        assert_eq!(stats[0].returns, 1);
        assert_eq!(stats[0].earliest, Some(at(3)));
        assert_eq!(stats[0].latest, Some(at(4)));
    }
}

//! Read-only query service
//!
//! Serves the most recent entries and returns per instrument. Transient
//! store failures are retried with a fixed policy; when the attempts run
//! out the caller gets an empty result instead of an error.

use std::sync::Arc;
use tracing::warn;

use series_common::data::{DailyReturn, Sample};
use series_common::retry::RetryPolicy;

use crate::config::QuerySettings;
use crate::storage::{SeriesStore, StoreResult};

#[derive(Clone)]
pub struct SeriesQueryService {
    store: Arc<dyn SeriesStore>,
    retry: RetryPolicy,
    default_limit: usize,
    max_limit: usize,
}

impl SeriesQueryService {
    pub fn new(store: Arc<dyn SeriesStore>, settings: &QuerySettings) -> Self {
        Self {
            store,
            retry: settings.retry_policy(),
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Effective row limit for a request
    pub fn resolve_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }

    /// Most recent entries for `unit`, newest first
    pub async fn entries(&self, unit: &str, limit: Option<usize>) -> Vec<Sample> {
        let limit = self.resolve_limit(limit);
        if limit == 0 {
            return Vec::new();
        }
        let store = &self.store;
        let result = self
            .retry
            .run("recent_samples", move || store.recent_samples(unit, limit))
            .await;
        or_empty(result, "recent_samples", unit)
    }

    /// Most recent rolling returns for `unit`, newest first
    pub async fn returns(&self, unit: &str, limit: Option<usize>) -> Vec<DailyReturn> {
        let limit = self.resolve_limit(limit);
        if limit == 0 {
            return Vec::new();
        }
        let store = &self.store;
        let result = self
            .retry
            .run("recent_returns", move || store.recent_returns(unit, limit))
            .await;
        or_empty(result, "recent_returns", unit)
    }

    /// Instruments with persisted entries
    pub async fn units(&self) -> Vec<String> {
        let store = &self.store;
        let result = self.retry.run("units", move || store.units()).await;
        or_empty(result, "units", "*")
    }
}

fn or_empty<T>(result: StoreResult<Vec<T>>, operation: &str, unit: &str) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!(operation, unit, error = %e, "Read failed, serving no data");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySeriesStore;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn seeded_store(hours: i64) -> Arc<MemorySeriesStore> {
        let store = Arc::new(MemorySeriesStore::new());
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let samples: Vec<Sample> = (0..hours)
            .map(|h| {
                Sample::new(
                    "BTCUSDT",
                    base + ChronoDuration::hours(h),
                    dec!(100),
                    dec!(101),
                    false,
                )
            })
            .collect();

        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&samples).await.unwrap();
        tx.commit().await.unwrap();
        store
    }

    fn service(store: Arc<MemorySeriesStore>, attempts: u32) -> SeriesQueryService {
        let settings = QuerySettings {
            retry_attempts: attempts,
            retry_delay_ms: 0,
            default_limit: 5,
            max_limit: 10,
        };
        SeriesQueryService::new(store, &settings)
    }

    #[test]
    fn test_limit_resolution() {
        let svc = service(Arc::new(MemorySeriesStore::new()), 1);
        assert_eq!(svc.resolve_limit(None), 5);
        assert_eq!(svc.resolve_limit(Some(3)), 3);
        assert_eq!(svc.resolve_limit(Some(500)), 10);
    }

    #[tokio::test]
    async fn test_entries_newest_first_and_limited() {
        let store = seeded_store(20).await;
        let svc = service(store, 1);

        let rows = svc.entries("BTCUSDT", Some(3)).await;
        assert_eq!(rows.len(), 3);
        assert!(rows[0].datetime > rows[1].datetime);
        assert_eq!(
            rows[0].datetime,
            Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap()
        );

        assert_eq!(svc.entries("BTCUSDT", None).await.len(), 5);
        assert_eq!(svc.entries("BTCUSDT", Some(100)).await.len(), 10);
        assert!(svc.entries("ETHUSDT", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let store = seeded_store(4).await;
        store.fail_next_reads(2);
        let svc = service(store, 3);

        assert_eq!(svc.entries("BTCUSDT", None).await.len(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_retries_yield_empty() {
        let store = seeded_store(4).await;
        store.fail_next_reads(5);
        let svc = service(store.clone(), 2).with_retry(RetryPolicy::new(2, Duration::ZERO));

        assert!(svc.entries("BTCUSDT", None).await.is_empty());
        assert!(svc.units().await.is_empty());
        // two attempts each, one failure left
        assert_eq!(svc.units().await, vec!["BTCUSDT".to_string()]);
    }
}

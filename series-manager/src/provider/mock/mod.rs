//! Mock kline source for testing
//!
//! Serves scripted per-unit klines and can be told to fail. Start
//! filtering follows the real endpoint: klines whose open time is at or
//! after the start hour are returned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use series_common::data::{truncate_to_hour, RawKline};

use crate::provider::{KlineSource, ProviderError, ProviderInfo, ProviderResult};

/// Scripted kline source
pub struct MockKlineSource {
    info: ProviderInfo,
    klines: RwLock<HashMap<String, Vec<RawKline>>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl MockKlineSource {
    /// Create an empty mock source
    pub fn new() -> Self {
        Self {
            info: ProviderInfo::hourly("mock", "Mock Provider"),
            klines: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the scripted klines for a unit
    pub fn set_klines(&self, unit: &str, mut klines: Vec<RawKline>) {
        klines.sort_by_key(|k| k.open_time_ms);
        self.klines.write().insert(unit.to_string(), klines);
    }

    /// Append klines for a unit, keeping open-time order
    pub fn push_klines(&self, unit: &str, klines: impl IntoIterator<Item = RawKline>) {
        let mut guard = self.klines.write();
        let series = guard.entry(unit.to_string()).or_default();
        series.extend(klines);
        series.sort_by_key(|k| k.open_time_ms);
    }

    /// Script one kline per hour starting at `first`, one per price pair
    pub fn push_hourly(&self, unit: &str, first: DateTime<Utc>, prices: &[(Decimal, Decimal)]) {
        let step = series_common::data::ONE_HOUR.num_milliseconds();
        let base = first.timestamp_millis();
        self.push_klines(
            unit,
            prices
                .iter()
                .enumerate()
                .map(|(i, (open, close))| RawKline::new(base + step * i as i64, *open, *close)),
        );
    }

    /// Make every subsequent fetch fail with a request error
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    /// Clear an injected failure
    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    /// Number of fetches served so far, failures included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockKlineSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KlineSource for MockKlineSource {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn fetch_hourly(
        &self,
        unit: &str,
        start: DateTime<Utc>,
    ) -> ProviderResult<Vec<RawKline>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failure.read().clone() {
            return Err(ProviderError::Request(message));
        }

        let start_ms = truncate_to_hour(start).timestamp_millis();
        Ok(self
            .klines
            .read()
            .get(unit)
            .map(|series| {
                series
                    .iter()
                    .filter(|k| k.open_time_ms >= start_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_filters_by_start_hour() {
        let source = MockKlineSource::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        source.push_hourly(
            "BTCUSDT",
            t0,
            &[(dec!(1), dec!(2)), (dec!(2), dec!(3)), (dec!(3), dec!(4))],
        );

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 20, 0).unwrap();
        let klines = source.fetch_hourly("BTCUSDT", start).await.unwrap();
        assert_eq!(klines.len(), 2);
        assert_eq!(klines[0].open, dec!(2));

        assert!(source.fetch_hourly("ETHUSDT", t0).await.unwrap().is_empty());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let source = MockKlineSource::new();
        source.fail_with("upstream down");
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            source.fetch_hourly("BTCUSDT", t0).await,
            Err(ProviderError::Request(_))
        ));

        source.clear_failure();
        assert!(source.fetch_hourly("BTCUSDT", t0).await.is_ok());
    }
}

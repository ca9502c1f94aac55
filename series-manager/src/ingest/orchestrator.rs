//! Refresh cycle driver

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use series_common::data::DailyReturn;

use crate::config::IngestSettings;
use crate::pipeline::{
    augment, compute_daily_return, needs_context, normalize, resolve_watermarks, window_bounds,
    Interpolator, RollingReturnError,
};
use crate::provider::KlineSource;
use crate::storage::{SeriesStore, SeriesTransaction};

use super::{CycleReport, IngestError, UnitReport};

/// Runs refresh cycles against a store and a kline source.
///
/// A cycle is all-or-nothing: every read and write goes through one
/// store transaction that is committed only when every due instrument
/// has been processed.
pub struct IngestionOrchestrator {
    store: Arc<dyn SeriesStore>,
    source: Arc<dyn KlineSource>,
    settings: IngestSettings,
    interpolator: Interpolator,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        source: Arc<dyn KlineSource>,
        settings: IngestSettings,
    ) -> Self {
        let interpolator = Interpolator::new(settings.interpolation_degree);
        Self {
            store,
            source,
            settings,
            interpolator,
        }
    }

    /// Run one refresh cycle against the current time
    pub async fn run_refresh_cycle(&self) -> Result<CycleReport, IngestError> {
        self.run_refresh_cycle_at(Utc::now()).await
    }

    /// Run one refresh cycle treating `now` as the current time
    pub async fn run_refresh_cycle_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, IngestError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(
            "refresh_cycle",
            cycle_id = %cycle_id,
            source = %self.source.info().name
        );

        self.run_cycle(cycle_id, now).instrument(span).await
    }

    async fn run_cycle(
        &self,
        cycle_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, IngestError> {
        let started = Instant::now();
        info!(%now, "Refresh cycle starting");

        let mut tx = self.store.begin().await?;

        match self.process(&mut *tx, now).await {
            Ok(units) => {
                tx.commit().await.map_err(IngestError::commit)?;

                let report = CycleReport {
                    cycle_id,
                    now,
                    units,
                    duration: started.elapsed(),
                };
                info!(
                    units = report.units.len(),
                    samples = report.samples_persisted(),
                    returns = report.returns_written(),
                    elapsed_ms = report.duration.as_millis() as u64,
                    "Refresh cycle committed"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                error!(error = %e, "Refresh cycle rolled back");
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        tx: &mut dyn SeriesTransaction,
        now: DateTime<Utc>,
    ) -> Result<Vec<UnitReport>, IngestError> {
        let latest = tx.latest_sample_times().await?;
        let watermarks = resolve_watermarks(
            &latest,
            &self.settings.units,
            self.settings.default_start,
            now,
        );

        if watermarks.is_empty() {
            info!("All instruments up to date");
            return Ok(Vec::new());
        }

        let mut reports = Vec::with_capacity(watermarks.len());
        for (unit, start) in &watermarks {
            reports.push(self.process_unit(tx, unit, *start).await?);
        }
        Ok(reports)
    }

    async fn process_unit(
        &self,
        tx: &mut dyn SeriesTransaction,
        unit: &str,
        start: DateTime<Utc>,
    ) -> Result<UnitReport, IngestError> {
        let mut report = UnitReport::new(unit, start);

        let klines = self
            .source
            .fetch_hourly(unit, start)
            .await
            .map_err(|e| IngestError::fetch(unit, e))?;
        report.fetched = klines.len();

        let window = normalize(unit, &klines, start);
        if window.is_empty() {
            debug!(unit, "Nothing new to persist");
            return Ok(report);
        }
        report.synthetic = window.synthetic_count();

        let context = if needs_context(&window, self.settings.context_trigger_len) {
            tx.recent_real_samples(unit, self.settings.context_rows)
                .await?
        } else {
            Vec::new()
        };
        report.context_rows = context.len();

        let boundaries = window.day_boundaries.clone();
        let samples = self
            .interpolator
            .fill(augment(window.rows, &context))
            .map_err(|e| IngestError::interpolation(unit, e))?;

        report.persisted = tx.insert_samples(&samples).await?;

        let mut returns: Vec<DailyReturn> = Vec::with_capacity(boundaries.len());
        for day in boundaries {
            let (after, until) = window_bounds(day);
            let rows = tx.samples_in_window(unit, after, until).await?;
            match compute_daily_return(unit, day, &rows) {
                Ok(r) => returns.push(r),
                Err(RollingReturnError::InsufficientRows { rows, .. }) => {
                    warn!(unit, %day, rows, "Window too short, no rolling return");
                    report.returns_skipped += 1;
                }
                Err(e) => return Err(IngestError::rolling(unit, e)),
            }
        }
        report.returns_written = tx.insert_returns(&returns).await?;

        info!(
            unit,
            fetched = report.fetched,
            persisted = report.persisted,
            synthetic = report.synthetic,
            context = report.context_rows,
            returns = report.returns_written,
            "Instrument refreshed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockKlineSource;
    use crate::storage::MemorySeriesStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn settings(units: &[&str]) -> IngestSettings {
        IngestSettings {
            units: units.iter().map(|u| u.to_string()).collect(),
            default_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ..IngestSettings::default()
        }
    }

    #[tokio::test]
    async fn test_first_cycle_from_default_start() {
        let store = Arc::new(MemorySeriesStore::new());
        let source = Arc::new(MockKlineSource::new());
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        source.push_hourly(
            "BTCUSDT",
            first,
            &[(dec!(100), dec!(101)), (dec!(101), dec!(102)), (dec!(102), dec!(103))],
        );

        let orchestrator = IngestionOrchestrator::new(store.clone(), source, settings(&["BTCUSDT"]));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        let report = orchestrator.run_refresh_cycle_at(now).await.unwrap();

        assert_eq!(report.samples_persisted(), 3);
        assert_eq!(store.samples("BTCUSDT").len(), 3);
        assert_eq!(report.unit("BTCUSDT").map(|u| u.start), Some(settings(&[]).default_start));
    }

    #[tokio::test]
    async fn test_empty_fetch_is_not_an_error() {
        let store = Arc::new(MemorySeriesStore::new());
        let source = Arc::new(MockKlineSource::new());

        let orchestrator = IngestionOrchestrator::new(store.clone(), source, settings(&["ETHUSDT"]));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        let report = orchestrator.run_refresh_cycle_at(now).await.unwrap();

        assert_eq!(report.samples_persisted(), 0);
        assert_eq!(store.sample_count(), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_surfaces_as_connection_error() {
        let store = Arc::new(MemorySeriesStore::new());
        store.fail_begin(true);
        let source = Arc::new(MockKlineSource::new());

        let orchestrator = IngestionOrchestrator::new(store, source.clone(), settings(&["BTCUSDT"]));
        let err = orchestrator.run_refresh_cycle().await.unwrap_err();

        assert!(matches!(err, IngestError::StoreConnection(_)));
        assert_eq!(source.calls(), 0);
    }
}

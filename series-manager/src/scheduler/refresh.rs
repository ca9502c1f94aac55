//! Periodic refresh driver

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::SchedulerSettings;
use crate::ingest::{CycleReport, IngestionOrchestrator};

use super::{Schedule, ScheduleExpression};

/// Runs the refresh cycle on a schedule until shutdown
pub struct RefreshScheduler {
    orchestrator: Arc<IngestionOrchestrator>,
    schedule: RwLock<Schedule>,
    run_on_start: bool,
}

impl RefreshScheduler {
    pub fn new(orchestrator: Arc<IngestionOrchestrator>, settings: &SchedulerSettings) -> Self {
        Self::with_expression(
            orchestrator,
            ScheduleExpression::from_settings(settings),
            settings.run_on_start,
        )
    }

    pub fn with_expression(
        orchestrator: Arc<IngestionOrchestrator>,
        expression: ScheduleExpression,
        run_on_start: bool,
    ) -> Self {
        Self {
            orchestrator,
            schedule: RwLock::new(Schedule::new("refresh", expression, Utc::now())),
            run_on_start,
        }
    }

    /// Current run state
    pub fn schedule(&self) -> Schedule {
        self.schedule.read().clone()
    }

    /// Run on a background task
    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Drive cycles until `shutdown` fires. A cycle in progress is allowed
    /// to finish.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            expression = ?self.schedule.read().expression,
            run_on_start = self.run_on_start,
            "Refresh scheduler started"
        );

        if self.run_on_start {
            self.run_once().await;
        }

        loop {
            let next_wait = self.schedule.read().wait_from(Utc::now());
            let Some(wait) = next_wait else {
                info!("No further refresh scheduled");
                let _ = shutdown.recv().await;
                break;
            };

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(wait) => {
                    self.run_once().await;
                }
            }
        }

        info!("Refresh scheduler stopped");
    }

    /// Run one cycle and record the run. Failures are logged, the next
    /// scheduled cycle retries from the persisted watermark.
    pub async fn run_once(&self) -> Option<CycleReport> {
        let result = self.orchestrator.run_refresh_cycle().await;
        self.schedule.write().mark_run(Utc::now());

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Scheduled refresh failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestSettings;
    use crate::provider::mock::MockKlineSource;
    use crate::storage::MemorySeriesStore;
    use std::time::Duration;

    fn orchestrator(source: Arc<MockKlineSource>) -> Arc<IngestionOrchestrator> {
        let settings = IngestSettings {
            units: vec!["BTCUSDT".to_string()],
            ..IngestSettings::default()
        };
        Arc::new(IngestionOrchestrator::new(
            Arc::new(MemorySeriesStore::new()),
            source,
            settings,
        ))
    }

    #[tokio::test]
    async fn test_runs_on_start_and_repeats() {
        let source = Arc::new(MockKlineSource::new());
        let scheduler = Arc::new(RefreshScheduler::with_expression(
            orchestrator(source.clone()),
            ScheduleExpression::Interval(chrono::Duration::milliseconds(10)),
            true,
        ));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = scheduler.clone().spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(source.calls() >= 2);
        assert!(scheduler.schedule().last_run.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_run() {
        let source = Arc::new(MockKlineSource::new());
        let scheduler = Arc::new(RefreshScheduler::with_expression(
            orchestrator(source.clone()),
            ScheduleExpression::TopOfHour,
            false,
        ));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = scheduler.clone().spawn(shutdown_rx);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert!(scheduler.schedule().last_run.is_none());
    }

    #[tokio::test]
    async fn test_failed_cycle_is_recorded() {
        let source = Arc::new(MockKlineSource::new());
        source.fail_with("upstream down");
        let scheduler = RefreshScheduler::with_expression(
            orchestrator(source.clone()),
            ScheduleExpression::TopOfHour,
            false,
        );

        assert!(scheduler.run_once().await.is_none());
        assert!(scheduler.schedule().last_run.is_some());
        assert_eq!(source.calls(), 1);
    }
}

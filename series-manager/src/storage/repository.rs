//! Store and transaction traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use series_common::data::{DailyReturn, Sample};
use series_common::error::{DatabaseError, ErrorCategory, ErrorClassification};

/// Store errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::from(err))
    }
}

impl ErrorClassification for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Database(err) => err.category(),
            StoreError::InvalidData(_) => ErrorCategory::Permanent,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-unit storage statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStats {
    pub unit: String,
    pub entries: u64,
    pub interpolated: u64,
    pub returns: u64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

/// Read-only access to committed data plus the entry point for writes
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Open the unit of work for one refresh cycle
    async fn begin(&self) -> StoreResult<Box<dyn SeriesTransaction>>;

    /// Newest samples for `unit`, newest first
    async fn recent_samples(&self, unit: &str, limit: usize) -> StoreResult<Vec<Sample>>;

    /// Newest daily returns for `unit`, newest first
    async fn recent_returns(&self, unit: &str, limit: usize) -> StoreResult<Vec<DailyReturn>>;

    /// Units with at least one persisted sample, sorted
    async fn units(&self) -> StoreResult<Vec<String>>;

    /// Row counts and time range per unit, sorted by unit
    async fn stats(&self) -> StoreResult<Vec<UnitStats>>;
}

/// Unit of work for a refresh cycle.
///
/// Reads see the transaction's own writes. Nothing is visible to
/// [`SeriesStore`] readers until [`commit`](Self::commit). Dropping a
/// transaction without committing discards it.
#[async_trait]
pub trait SeriesTransaction: Send {
    /// Newest persisted sample time per unit
    async fn latest_sample_times(&mut self) -> StoreResult<HashMap<String, DateTime<Utc>>>;

    /// Newest non-interpolated samples for `unit`, newest first
    async fn recent_real_samples(&mut self, unit: &str, limit: usize)
        -> StoreResult<Vec<Sample>>;

    /// Insert samples; a duplicate `(unit, datetime)` fails the whole call
    async fn insert_samples(&mut self, samples: &[Sample]) -> StoreResult<usize>;

    /// Samples for `unit` with `after < datetime <= until`, ascending
    async fn samples_in_window(
        &mut self,
        unit: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Sample>>;

    /// Insert returns; a duplicate `(date, unit)` fails the whole call
    async fn insert_returns(&mut self, returns: &[DailyReturn]) -> StoreResult<usize>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification_follows_database_error() {
        let err = StoreError::from(DatabaseError::Connection("reset".to_string()));
        assert!(err.is_transient());

        let err = StoreError::from(DatabaseError::Write("duplicate".to_string()));
        assert!(err.is_permanent());

        let err = StoreError::InvalidData("negative count".to_string());
        assert!(err.is_permanent());
    }

    #[test]
    fn test_store_error_from_sqlx() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            StoreError::Database(DatabaseError::PoolExhausted)
        ));
    }
}

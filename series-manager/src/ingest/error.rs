//! Cycle-level error kinds

use thiserror::Error;

use series_common::error::{DatabaseError, ErrorCategory, ErrorClassification};

use crate::pipeline::{InterpolationError, RollingReturnError};
use crate::provider::ProviderError;
use crate::storage::StoreError;

/// Why a refresh cycle failed. Any of these rolls the whole cycle back.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    /// The store could not be reached or the pool is exhausted
    #[error("Store connection failed: {0}")]
    StoreConnection(String),

    #[error("Store query failed: {0}")]
    StoreQuery(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Too few real prices to fit the interpolation polynomial
    #[error("Insufficient data to interpolate {unit}: {source}")]
    InsufficientData {
        unit: String,
        #[source]
        source: InterpolationError,
    },

    /// Fit failed for a numerical reason
    #[error("Interpolation failed for {unit}: {source}")]
    Interpolation {
        unit: String,
        #[source]
        source: InterpolationError,
    },

    /// Zero base price in a rolling-return window
    #[error("Rolling return failed for {unit}: {source}")]
    DivideByZero {
        unit: String,
        #[source]
        source: RollingReturnError,
    },

    #[error("Rolling return computation failed for {unit}: {source}")]
    RollingReturn {
        unit: String,
        #[source]
        source: RollingReturnError,
    },

    /// Market-data source unreachable or returned garbage
    #[error("Fetch failed for {unit}: {source}")]
    ExternalFetch {
        unit: String,
        #[source]
        source: ProviderError,
    },
}

impl IngestError {
    pub fn interpolation(unit: &str, err: InterpolationError) -> Self {
        match err {
            InterpolationError::InsufficientData { .. } => IngestError::InsufficientData {
                unit: unit.to_string(),
                source: err,
            },
            _ => IngestError::Interpolation {
                unit: unit.to_string(),
                source: err,
            },
        }
    }

    pub fn rolling(unit: &str, err: RollingReturnError) -> Self {
        match err {
            RollingReturnError::DivideByZero { .. } => IngestError::DivideByZero {
                unit: unit.to_string(),
                source: err,
            },
            _ => IngestError::RollingReturn {
                unit: unit.to_string(),
                source: err,
            },
        }
    }

    pub fn fetch(unit: &str, err: ProviderError) -> Self {
        IngestError::ExternalFetch {
            unit: unit.to_string(),
            source: err,
        }
    }

    /// Map a failure raised while committing
    pub fn commit(err: StoreError) -> Self {
        match IngestError::from(err) {
            IngestError::StoreQuery(msg) => IngestError::StoreWrite(msg),
            other => other,
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Database(
                DatabaseError::Connection(_)
                | DatabaseError::PoolExhausted
                | DatabaseError::Timeout(_),
            ) => IngestError::StoreConnection(message),
            StoreError::Database(DatabaseError::Write(_)) => IngestError::StoreWrite(message),
            _ => IngestError::StoreQuery(message),
        }
    }
}

impl ErrorClassification for IngestError {
    fn category(&self) -> ErrorCategory {
        match self {
            IngestError::StoreConnection(_) => ErrorCategory::Transient,
            IngestError::StoreQuery(_) | IngestError::StoreWrite(_) => ErrorCategory::Permanent,
            IngestError::InsufficientData { .. }
            | IngestError::Interpolation { .. }
            | IngestError::DivideByZero { .. }
            | IngestError::RollingReturn { .. } => ErrorCategory::Permanent,
            IngestError::ExternalFetch { source, .. } => source.category(),
        }
    }
}

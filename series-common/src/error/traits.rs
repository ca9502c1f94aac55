//! Error classification traits for retry logic and error handling.
//!
//! These traits allow errors to self-describe their characteristics,
//! so the read path can decide generically whether a retry is worth it.

use super::common::*;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve on retry (network issues, timeouts)
    Transient,
    /// Permanent errors that won't resolve on retry (invalid input, not found)
    Permanent,
    /// Resource exhaustion errors (rate limits, pool exhausted)
    ResourceExhausted,
    /// Configuration errors (missing config, invalid settings)
    Configuration,
    /// Internal errors (bugs, unexpected state)
    Internal,
}

/// Trait for errors that can classify themselves for retry logic.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }
}

impl ErrorClassification for DatabaseError {
    fn category(&self) -> ErrorCategory {
        match self {
            DatabaseError::Connection(_) => ErrorCategory::Transient,
            DatabaseError::PoolExhausted => ErrorCategory::ResourceExhausted,
            DatabaseError::Timeout(_) => ErrorCategory::Transient,
            DatabaseError::Transaction(_) => ErrorCategory::Transient, // May be deadlock
            DatabaseError::Query(_) => ErrorCategory::Permanent,       // Usually bad SQL
            DatabaseError::Write(_) => ErrorCategory::Permanent,
        }
    }
}

impl ErrorClassification for ConfigurationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

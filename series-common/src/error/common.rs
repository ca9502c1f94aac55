//! Common error types shared across crates.
//!
//! Crate-specific errors wrap these using `#[from]` where a boundary
//! needs its own vocabulary.

use std::time::Duration;
use thiserror::Error;

/// Relational store errors.
///
/// Covers connection setup, reads, writes and transaction control.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DatabaseError {
    /// Connection to database failed
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Read query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Insert failed (including uniqueness violations)
    #[error("Write failed: {0}")]
    Write(String),

    /// Transaction begin/commit/rollback failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Connection pool exhausted
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Query timeout
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),
}

impl DatabaseError {
    /// Map a driver error raised by an insert
    pub fn write(err: sqlx::Error) -> Self {
        match DatabaseError::from(err) {
            DatabaseError::Query(msg) => DatabaseError::Write(msg),
            other => other,
        }
    }

    /// Map a driver error raised by begin/commit/rollback
    pub fn transaction(err: sqlx::Error) -> Self {
        match DatabaseError::from(err) {
            DatabaseError::Query(msg) => DatabaseError::Transaction(msg),
            other => other,
        }
    }

    /// Unique-key violation on insert
    pub fn duplicate(table: &str, key: impl std::fmt::Display) -> Self {
        DatabaseError::Write(format!("duplicate key in {}: {}", table, key))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                DatabaseError::Connection(err.to_string())
            }
            sqlx::Error::Configuration(_) => DatabaseError::Connection(err.to_string()),
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

/// Configuration-related errors.
///
/// Use this for configuration loading, parsing, and validation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field has invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Configuration file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ConfigurationError {
    /// Create an InvalidValue error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

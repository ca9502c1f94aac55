//! Provider trait definitions
//!
//! A kline source delivers raw hourly samples for one instrument from a
//! start point up to now. Binance is the production source; the mock
//! source scripts responses for tests and offline runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use series_common::data::RawKline;
use series_common::error::{ErrorCategory, ErrorClassification};

/// Provider error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ErrorClassification for ProviderError {
    fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::Connection(_) => ErrorCategory::Transient,
            ProviderError::Request(_) => ErrorCategory::Transient,
            ProviderError::Parse(_) => ErrorCategory::Permanent,
            ProviderError::RateLimit(_) => ErrorCategory::ResourceExhausted,
            ProviderError::SymbolNotFound(_) => ErrorCategory::Permanent,
            ProviderError::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Information about a kline source
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name (e.g., "binance", "mock")
    pub name: String,
    /// Provider display name
    pub display_name: String,
    /// Sampling interval of the delivered klines
    pub interval: Duration,
}

impl ProviderInfo {
    /// Info for a source delivering one-hour klines
    pub fn hourly(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            interval: Duration::from_secs(3600),
        }
    }
}

/// Source of raw hourly klines
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Get provider information
    fn info(&self) -> &ProviderInfo;

    /// Fetch hourly klines for `unit` from `start` (inclusive) until now,
    /// ascending by open time. Gaps are possible and not reported.
    async fn fetch_hourly(&self, unit: &str, start: DateTime<Utc>)
        -> ProviderResult<Vec<RawKline>>;
}

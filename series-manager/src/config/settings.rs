//! Application settings and configuration

use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use series_common::error::ConfigurationError;
use series_common::retry::RetryPolicy;

/// Keeps a multi-row insert under the Postgres bind parameter limit
pub const MAX_BATCH_INSERT_SIZE: usize = 10_000;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    pub database: DatabaseSettings,
    /// Market-data provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Ingestion pipeline settings
    #[serde(default)]
    pub ingest: IngestSettings,
    /// Read path settings
    #[serde(default)]
    pub query: QuerySettings,
    /// Refresh scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Rows per multi-row INSERT statement
    #[serde(default = "default_batch_size")]
    pub batch_insert_size: usize,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    1000
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Provider-specific settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Binance REST configuration
    #[serde(default)]
    pub binance: BinanceSettings,
}

/// Binance REST klines settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceSettings {
    /// REST base URL
    #[serde(default = "default_binance_base_url")]
    pub base_url: String,
    /// Request budget per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Klines per request (endpoint maximum is 1000)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_requests_per_minute() -> u32 {
    600
}

fn default_page_limit() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            base_url: default_binance_base_url(),
            requests_per_minute: default_requests_per_minute(),
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Ingestion pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Tracked instruments
    #[serde(default = "default_units")]
    pub units: Vec<String>,
    /// Start point for instruments with no history
    #[serde(default = "default_start")]
    pub default_start: DateTime<Utc>,
    /// Persisted real samples borrowed as fitting context
    #[serde(default = "default_context_rows")]
    pub context_rows: usize,
    /// Windows up to this length get context when they have gaps
    #[serde(default = "default_context_trigger_len")]
    pub context_trigger_len: usize,
    /// Polynomial degree for gap filling (2 or 3)
    #[serde(default = "default_interpolation_degree")]
    pub interpolation_degree: usize,
}

fn default_units() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_514_764_800, 0).unwrap_or_default()
}

fn default_context_rows() -> usize {
    100
}

fn default_context_trigger_len() -> usize {
    100
}

fn default_interpolation_degree() -> usize {
    3
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            units: default_units(),
            default_start: default_start(),
            context_rows: default_context_rows(),
            context_trigger_len: default_context_trigger_len(),
            interpolation_degree: default_interpolation_degree(),
        }
    }
}

/// Read path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Attempts per read, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed pause between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Records returned when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Upper bound on any requested limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_limit() -> usize {
    24
}

fn default_max_limit() -> usize {
    1000
}

impl QuerySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Refresh scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Minutes between refresh cycles
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: i64,
    /// Run one cycle immediately on start
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// Align cycles to the top of the hour instead of a fixed interval
    #[serde(default)]
    pub align_to_hour: bool,
}

fn default_refresh_interval() -> i64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: default_refresh_interval(),
            run_on_start: true,
            align_to_hour: false,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address for the API
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8081".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Settings {
    /// Load settings from files and `SERIES_MANAGER__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("SERIES_MANAGER")
    }

    /// Load settings with a custom environment prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., SERIES_MANAGER__DATABASE__URL)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ingest.units")
                    .try_parsing(true),
            )
            .set_default("database.url", Self::fallback_database_url())?
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("SERIES_MANAGER_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    fn fallback_database_url() -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/series_manager".into())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::MissingField("database.url".into()));
        }
        if !(1..=MAX_BATCH_INSERT_SIZE).contains(&self.database.batch_insert_size) {
            return Err(ConfigurationError::invalid(
                "database.batch_insert_size",
                format!("must be between 1 and {}", MAX_BATCH_INSERT_SIZE),
            ));
        }
        if self.ingest.units.iter().all(|u| u.trim().is_empty()) {
            return Err(ConfigurationError::invalid(
                "ingest.units",
                "at least one instrument is required",
            ));
        }
        if !(2..=3).contains(&self.ingest.interpolation_degree) {
            return Err(ConfigurationError::invalid(
                "ingest.interpolation_degree",
                "must be 2 or 3",
            ));
        }
        if self.query.retry_attempts == 0 {
            return Err(ConfigurationError::invalid(
                "query.retry_attempts",
                "must be at least 1",
            ));
        }
        if self.scheduler.refresh_interval_minutes <= 0 {
            return Err(ConfigurationError::invalid(
                "scheduler.refresh_interval_minutes",
                "must be positive",
            ));
        }
        if self.provider.binance.requests_per_minute == 0 || self.provider.binance.page_limit == 0
        {
            return Err(ConfigurationError::invalid(
                "provider.binance",
                "requests_per_minute and page_limit must be positive",
            ));
        }
        Ok(())
    }

    /// Create default settings (useful for testing)
    pub fn default_settings() -> Self {
        Settings {
            database: DatabaseSettings {
                url: Self::fallback_database_url(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                acquire_timeout_secs: default_acquire_timeout(),
                batch_insert_size: default_batch_size(),
            },
            provider: ProviderSettings::default(),
            ingest: IngestSettings::default(),
            query: QuerySettings::default(),
            scheduler: SchedulerSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::default_settings()
    }
}

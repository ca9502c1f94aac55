//! Logging configuration and initialization.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
const UTC_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse format from string, falling back to `Pretty`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Local time with offset
    #[default]
    Local,
    /// UTC (ISO 8601)
    Utc,
    /// No timestamps
    None,
}

impl TimestampFormat {
    /// Parse format from string, falling back to `Local`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub timestamps: TimestampFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// Include source file and line
    pub include_location: bool,
    pub include_thread_ids: bool,
    /// Include target (module path)
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_location: true,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| s == "true" || s == "1")
        .unwrap_or(default)
}

impl LogConfig {
    /// Create config from `LOG_*` environment variables
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: env_flag("LOG_LOCATION", true),
            include_thread_ids: env_flag("LOG_THREAD_IDS", false),
            include_target: true,
        }
    }

    /// JSON lines with UTC timestamps, for log shipping
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            timestamps: TimestampFormat::Utc,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    /// Single-line output without source locations
    pub fn compact() -> Self {
        Self {
            format: LogFormat::Compact,
            include_location: false,
            ..Default::default()
        }
    }

    /// Set the default log level
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true);

    // Each format/timer pair produces a distinct layer type, hence the fan-out.
    match (config.format, config.timestamps) {
        (LogFormat::Json, TimestampFormat::None) => {
            registry
                .with(layer.json().with_current_span(true).without_time())
                .try_init()?;
        }
        (LogFormat::Json, TimestampFormat::Local) => {
            registry
                .with(
                    layer
                        .json()
                        .with_current_span(true)
                        .with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())),
                )
                .try_init()?;
        }
        (LogFormat::Json, TimestampFormat::Utc) => {
            registry
                .with(
                    layer
                        .json()
                        .with_current_span(true)
                        .with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())),
                )
                .try_init()?;
        }
        (format, timestamps) => {
            let ansi = std::io::stdout().is_terminal();
            let layer = layer.with_ansi(ansi);
            match (format == LogFormat::Compact, timestamps) {
                (true, TimestampFormat::None) => {
                    registry.with(layer.compact().without_time()).try_init()?
                }
                (true, TimestampFormat::Local) => registry
                    .with(
                        layer
                            .compact()
                            .with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())),
                    )
                    .try_init()?,
                (true, TimestampFormat::Utc) => registry
                    .with(
                        layer
                            .compact()
                            .with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())),
                    )
                    .try_init()?,
                (false, TimestampFormat::None) => {
                    registry.with(layer.without_time()).try_init()?
                }
                (false, TimestampFormat::Local) => registry
                    .with(layer.with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())))
                    .try_init()?,
                (false, TimestampFormat::Utc) => registry
                    .with(layer.with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())))
                    .try_init()?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_timestamp_format_parse() {
        assert_eq!(TimestampFormat::parse("utc"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("UTC"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("local"), TimestampFormat::Local);
        assert_eq!(TimestampFormat::parse("none"), TimestampFormat::None);
        assert_eq!(TimestampFormat::parse("off"), TimestampFormat::None);
    }

    #[test]
    fn test_log_config_presets() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
        assert!(!config.include_thread_ids);

        let config = LogConfig::json();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.timestamps, TimestampFormat::Utc);
        assert!(config.include_thread_ids);

        let config = LogConfig::compact().with_default_level("debug");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.include_location);
        assert_eq!(config.default_level, "debug");
    }
}

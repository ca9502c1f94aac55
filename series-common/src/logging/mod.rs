//! Logging setup shared by the series binaries.
//!
//! Console output is human-readable by default; JSON lines are available for
//! log aggregation.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., `info`, `series_manager=debug`)
//! - `LOG_FORMAT`: Output format - `pretty` (default), `compact`, or `json`
//! - `LOG_TIMESTAMPS`: Timestamp format - `local` (default), `utc`, or `none`
//! - `LOG_LEVEL`: Fallback level when `RUST_LOG` is unset
//! - `LOG_LOCATION`: `true`/`false` for file:line info
//!
//! # Usage
//!
//! ```rust,ignore
//! use series_common::logging::{init_logging, LogConfig};
//!
//! init_logging(LogConfig::from_env())?;
//! ```

mod config;

pub use config::{init_logging, LogConfig, LogFormat, TimestampFormat};

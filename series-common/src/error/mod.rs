//! Shared error handling for the series pipeline.
//!
//! This module provides:
//! - Common error types reused by the store and configuration layers
//! - Error classification traits consumed by [`crate::retry::RetryPolicy`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use series_common::error::{DatabaseError, ErrorClassification};
//!
//! fn should_retry(err: &DatabaseError) -> bool {
//!     err.is_transient()
//! }
//! ```

mod common;
mod traits;

pub use common::*;
pub use traits::*;

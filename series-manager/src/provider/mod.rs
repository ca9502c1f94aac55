//! Market-data provider abstractions and implementations
//!
//! This module defines the kline source interface and implements the
//! Binance REST source plus a scripted mock for testing.

pub mod binance;
pub mod mock;
mod traits;

pub use traits::*;

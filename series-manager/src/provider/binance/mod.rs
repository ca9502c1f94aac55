//! Binance market-data source
//!
//! Fetches hourly klines from the public REST API.

mod client;
mod types;

pub use client::BinanceKlineClient;
pub use types::{parse_kline_row, parse_klines, BinanceErrorResponse};

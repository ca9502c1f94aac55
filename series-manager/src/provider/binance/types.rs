//! Binance REST message types
//!
//! Klines arrive as positional JSON arrays:
//! `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`.
//! Only open time, open and close are kept.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use series_common::data::RawKline;

use crate::provider::{ProviderError, ProviderResult};

const OPEN_TIME: usize = 0;
const OPEN: usize = 1;
const CLOSE: usize = 4;

/// Error body returned by the REST API on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct BinanceErrorResponse {
    pub code: i32,
    pub msg: String,
}

/// Parse one positional kline row
pub fn parse_kline_row(row: &Value) -> ProviderResult<RawKline> {
    let fields = row
        .as_array()
        .ok_or_else(|| ProviderError::Parse(format!("kline is not an array: {}", row)))?;

    if fields.len() <= CLOSE {
        return Err(ProviderError::Parse(format!(
            "kline has {} fields, expected at least {}",
            fields.len(),
            CLOSE + 1
        )));
    }

    let open_time_ms = fields[OPEN_TIME]
        .as_i64()
        .ok_or_else(|| ProviderError::Parse(format!("invalid open time: {}", fields[OPEN_TIME])))?;

    Ok(RawKline::new(
        open_time_ms,
        parse_price(&fields[OPEN], "open")?,
        parse_price(&fields[CLOSE], "close")?,
    ))
}

/// Parse a whole klines response body
pub fn parse_klines(body: &str) -> ProviderResult<Vec<RawKline>> {
    let rows: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Failed to parse klines: {}", e)))?;
    rows.iter().map(parse_kline_row).collect()
}

// Prices are quoted as strings; numbers are tolerated.
fn parse_price(value: &Value, field: &str) -> ProviderResult<Decimal> {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ProviderError::Parse(format!("invalid {} price: {}", field, value)))
}

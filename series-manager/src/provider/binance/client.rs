//! Binance REST klines client
//!
//! Pages forward through `GET /api/v3/klines` at a one-hour interval until
//! a short page signals that "now" has been reached. Every request waits
//! on a shared rate limiter first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use series_common::data::{RawKline, ONE_HOUR};

use super::types::{parse_klines, BinanceErrorResponse};
use crate::config::BinanceSettings;
use crate::provider::{KlineSource, ProviderError, ProviderInfo, ProviderResult};

const KLINES_ENDPOINT: &str = "/api/v3/klines";
const HOURLY_INTERVAL: &str = "1h";

/// Binance hourly kline source
pub struct BinanceKlineClient {
    info: ProviderInfo,
    client: Client,
    base_url: String,
    page_limit: u32,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl BinanceKlineClient {
    /// Create a client from settings
    pub fn new(settings: &BinanceSettings) -> ProviderResult<Self> {
        let per_minute = NonZeroU32::new(settings.requests_per_minute).ok_or_else(|| {
            ProviderError::Configuration("requests_per_minute must be > 0".to_string())
        })?;
        if settings.page_limit == 0 {
            return Err(ProviderError::Configuration(
                "page_limit must be > 0".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            info: ProviderInfo::hourly("binance", "Binance"),
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_limit: settings.page_limit,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// Fetch one page of klines starting at `start_ms`
    async fn fetch_page(&self, unit: &str, start_ms: i64) -> ProviderResult<Vec<RawKline>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, KLINES_ENDPOINT);
        let start_param = start_ms.to_string();
        let limit_param = self.page_limit.to_string();

        debug!(unit, start_ms, "GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", unit),
                ("interval", HOURLY_INTERVAL),
                ("startTime", start_param.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::Connection(e.to_string())
                } else {
                    ProviderError::Request(e.to_string())
                }
            })?;

        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> ProviderResult<Vec<RawKline>> {
        let status = response.status();

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to read response: {}", e)))?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(ProviderError::RateLimit(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<BinanceErrorResponse>(&body) {
                return Err(Self::map_error_code(error.code, &error.msg));
            }
            return Err(ProviderError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        parse_klines(&body)
    }

    /// Map REST error codes to provider errors
    fn map_error_code(code: i32, message: &str) -> ProviderError {
        match code {
            -1003 | -1015 => ProviderError::RateLimit(message.to_string()),
            -1121 => ProviderError::SymbolNotFound(message.to_string()),
            _ => ProviderError::Request(format!("code {}: {}", code, message)),
        }
    }
}

#[async_trait]
impl KlineSource for BinanceKlineClient {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn fetch_hourly(
        &self,
        unit: &str,
        start: DateTime<Utc>,
    ) -> ProviderResult<Vec<RawKline>> {
        let now_ms = Utc::now().timestamp_millis();
        let step_ms = ONE_HOUR.num_milliseconds();
        let mut cursor = start.timestamp_millis();
        let mut klines = Vec::new();
        let mut pages = 0usize;

        while cursor <= now_ms {
            let page = self.fetch_page(unit, cursor).await?;
            pages += 1;

            let Some(last) = page.last() else {
                break;
            };
            let next = last.open_time_ms + step_ms;
            let short_page = page.len() < self.page_limit as usize;
            klines.extend(page);

            // Guard against an endpoint that stops advancing.
            if short_page || next <= cursor {
                break;
            }
            cursor = next;
        }

        debug!(unit, pages, klines = klines.len(), "Fetched hourly klines");
        Ok(klines)
    }
}

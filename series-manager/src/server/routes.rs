//! Request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;

/// `?limit=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Response {
    let body = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn units_handler(State(state): State<AppState>) -> Response {
    let units = state.query.units().await;
    (StatusCode::OK, Json(units)).into_response()
}

pub async fn entries_handler(
    State(state): State<AppState>,
    Path(unit): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Response {
    let rows = state.query.entries(&unit, params.limit).await;
    (StatusCode::OK, Json(rows)).into_response()
}

pub async fn returns_handler(
    State(state): State<AppState>,
    Path(unit): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Response {
    let rows = state.query.returns(&unit, params.limit).await;
    (StatusCode::OK, Json(rows)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuerySettings;
    use crate::query::SeriesQueryService;
    use crate::storage::{MemorySeriesStore, SeriesStore};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use series_common::data::{DailyReturn, Sample};
    use std::sync::Arc;

    async fn state() -> AppState {
        let store = Arc::new(MemorySeriesStore::new());
        let mut tx = store.begin().await.unwrap();
        tx.insert_samples(&[
            Sample::new(
                "BTCUSDT",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                dec!(100),
                dec!(101),
                false,
            ),
            Sample::new(
                "BTCUSDT",
                Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
                dec!(101),
                dec!(102.5),
                true,
            ),
        ])
        .await
        .unwrap();
        tx.insert_returns(&[DailyReturn::new(
            "BTCUSDT",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            dec!(0.5),
            dec!(0.25),
        )])
        .await
        .unwrap();
        tx.commit().await.unwrap();

        AppState::new(SeriesQueryService::new(store, &QuerySettings::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_entries_records_use_column_names() {
        let response = entries_handler(
            State(state().await),
            Path("BTCUSDT".to_string()),
            Query(LimitQuery { limit: Some(1) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["unit"], "BTCUSDT");
        assert_eq!(rows[0]["closing"], "102.5");
        assert_eq!(rows[0]["interpolated"], true);
        assert!(rows[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_returns_and_units() {
        let state = state().await;

        let response = returns_handler(
            State(state.clone()),
            Path("BTCUSDT".to_string()),
            Query(LimitQuery::default()),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body[0]["date"], "2024-01-01");
        assert_eq!(body[0]["opening"], "0.5");

        let body = body_json(units_handler(State(state)).await).await;
        assert_eq!(body, serde_json::json!(["BTCUSDT"]));
    }

    #[tokio::test]
    async fn test_unknown_unit_is_empty() {
        let response = entries_handler(
            State(state().await),
            Path("DOGEUSDT".to_string()),
            Query(LimitQuery::default()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }
}

//! HTTP query surface
//!
//! Read-only JSON endpoints over the query service:
//!
//! - `GET /health`
//! - `GET /units`
//! - `GET /entries/{unit}?limit=N`
//! - `GET /returns/{unit}?limit=N`

mod routes;

pub use routes::*;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::query::SeriesQueryService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub query: SeriesQueryService,
}

impl AppState {
    pub fn new(query: SeriesQueryService) -> Self {
        Self { query }
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/units", get(units_handler))
        .route("/entries/{unit}", get(entries_handler))
        .route("/returns/{unit}", get(returns_handler))
        .with_state(state)
}

/// Serve the API on `bind` until `shutdown` fires
pub async fn serve(
    bind: &str,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    info!("API stopped");
    Ok(())
}

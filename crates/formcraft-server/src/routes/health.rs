//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::response::{ok, ApiResponse};
use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub database_connected: bool,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            false
        }
    };

    ok(HealthResponse {
        status: if database_connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        backend: state.store.backend(),
        database_connected,
    })
}

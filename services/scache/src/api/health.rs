//! Health check endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status: "ok" or "starting".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Current timestamp (ISO 8601).
    pub timestamp: String,

    /// Generation of the published snapshot (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

fn response(status: &str, generation: Option<u64>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: "scache".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        generation,
    }
}

/// Liveness: the process is up.
async fn healthz() -> impl IntoResponse {
    Json(response("ok", None))
}

/// Readiness: at least one snapshot has been published.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let generation = state.cache().generation();

    if generation > 0 {
        (StatusCode::OK, Json(response("ok", Some(generation))))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(response("starting", Some(generation))),
        )
    }
}

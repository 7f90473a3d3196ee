//! HTTP API handlers and routing.

mod health;
mod stras;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .nest("/v1", stras::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

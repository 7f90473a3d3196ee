//! Strategy snapshot endpoints polled by judges.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use monstra_model::Strategy;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stras/effective", get(effective))
        .route("/stras/snapshot", get(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct EffectiveQuery {
    /// Judge label, as registered in the hash ring.
    pub instance: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EffectiveResponse {
    pub generation: u64,
    pub instance: String,
    pub stras: Vec<Strategy>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub generation: u64,
    pub generated_at: Option<DateTime<Utc>>,
    pub judges: BTreeMap<String, usize>,
}

/// Strategies assigned to one judge in the current snapshot.
async fn effective(
    State(state): State<AppState>,
    Query(query): Query<EffectiveQuery>,
) -> Json<EffectiveResponse> {
    let snapshot = state.cache().load();

    Json(EffectiveResponse {
        generation: snapshot.generation,
        stras: snapshot.for_judge(&query.instance).to_vec(),
        instance: query.instance,
    })
}

async fn snapshot(State(state): State<AppState>) -> Json<SnapshotSummary> {
    let snapshot = state.cache().load();

    Json(SnapshotSummary {
        generation: snapshot.generation,
        generated_at: snapshot.generated_at,
        judges: snapshot.counts().into_iter().collect(),
    })
}

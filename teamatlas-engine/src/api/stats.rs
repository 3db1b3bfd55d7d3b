//! Engine statistics endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::service::EngineStats;
use crate::AppState;

/// GET /stats
///
/// Cache counters, queue length, per-source request counts and scheduler counters.
pub async fn get_stats(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.atlas.get_stats().await)
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

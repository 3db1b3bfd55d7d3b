//! Country team endpoints
//!
//! - `GET /countries/:code/teams` cached dataset (never empty)
//! - `POST /countries/:code/refresh` bypass the cache and refetch now
//! - `POST /updates` queue countries for the background scheduler

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::types::CountryDataset;
use crate::AppState;

/// Summary of a synchronous refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub country_code: String,
    pub teams: usize,
    pub is_fallback: bool,
    pub all_sources_failed: bool,
    pub data_sources: Vec<String>,
}

/// POST /updates request body
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub countries: Vec<String>,
}

/// POST /updates response
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub requested: usize,
    pub queued: usize,
}

/// GET /countries/:code/teams
pub async fn get_country_teams(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Json<CountryDataset> {
    Json(state.atlas.get_country_teams(&code).await)
}

/// POST /countries/:code/refresh
pub async fn refresh_country(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> EngineResult<Json<RefreshResponse>> {
    let outcome = state.atlas.refresh_country(&code).await?;
    let dataset = outcome.dataset;

    Ok(Json(RefreshResponse {
        country_code: dataset.country_code,
        teams: dataset.teams.len(),
        is_fallback: dataset.is_fallback,
        all_sources_failed: outcome.all_sources_failed,
        data_sources: dataset.data_sources,
    }))
}

/// POST /updates
pub async fn force_update(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> EngineResult<Json<UpdateResponse>> {
    if request.countries.is_empty() {
        return Err(EngineError::BadRequest("countries must not be empty".to_string()));
    }

    let queued = state.atlas.force_update(&request.countries).await?;
    info!(requested = request.countries.len(), queued, "Forced update via API");

    Ok(Json(UpdateResponse {
        requested: request.countries.len(),
        queued,
    }))
}

pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/countries/:code/teams", get(get_country_teams))
        .route("/countries/:code/refresh", post(refresh_country))
        .route("/updates", post(force_update))
}

//! teamatlas-engine library interface
//!
//! Multi-source team data fusion: tiered cache, source adapters, record
//! fusion, per-country orchestration and a priority-tiered update scheduler.

pub mod adapters;
pub mod api;
pub mod cache;
pub mod config;
pub mod countries;
pub mod db;
pub mod error;
pub mod fusion;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod types;
pub mod utils;

pub use crate::error::{EngineError, EngineResult};
pub use crate::service::{EngineStats, TeamAtlas};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub atlas: Arc<TeamAtlas>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(atlas: Arc<TeamAtlas>) -> Self {
        Self {
            atlas,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::team_routes())
        .merge(api::stats_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

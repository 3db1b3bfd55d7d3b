//! Error types for teamatlas-engine
//!
//! Consumer-facing lookups never fail (they degrade to fallback data); these
//! errors surface from the scheduler-facing refresh path, service wiring and
//! the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::adapters::SourceError;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Country code is not two ASCII letters (400)
    #[error("Invalid country code: {0}")]
    InvalidCountry(String),

    /// Every attempted source failed at transport level (503)
    #[error("All sources unavailable for {0}")]
    SourcesUnavailable(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Adapter could not be constructed
    #[error("Source setup failed: {0}")]
    Source(#[from] SourceError),

    /// Internal error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// teamatlas-common error
    #[error("Common error: {0}")]
    Common(#[from] teamatlas_common::Error),
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            EngineError::InvalidCountry(ref code) => (
                StatusCode::BAD_REQUEST,
                "INVALID_COUNTRY",
                format!("Invalid country code: {}", code),
            ),
            EngineError::SourcesUnavailable(ref code) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SOURCES_UNAVAILABLE",
                format!("All sources unavailable for {}", code),
            ),
            EngineError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            EngineError::Source(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SOURCE_ERROR",
                err.to_string(),
            ),
            EngineError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            EngineError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

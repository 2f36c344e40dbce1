//! Error types for the resilience engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Engine Error Enum ==
/// Unified error type for the cache engine, retry orchestrator and router.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or malformed request field
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation name not recognised by the resolver
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Key or named target not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend failure (file system, remote store)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Failed to encode or decode a stored entry
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No registered resolver accepted the task
    #[error("No resolver can handle task: {0}")]
    NoResolver(String),

    /// Unexpected internal fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}


// == IntoResponse Implementation ==
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::InvalidRequest(_) | EngineError::UnknownOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::NotFound(_) | EngineError::NoResolver(_) => StatusCode::NOT_FOUND,
            EngineError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Serialization(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resilience engine.
pub type Result<T> = std::result::Result<T, EngineError>;

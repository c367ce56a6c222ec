//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type surfaced to cache callers.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid configuration, fatal at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// TTL of zero (or below the store's resolution)
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    /// Logical name cannot be used to build a key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A value or key parameter cannot be canonically encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid admin request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The pager's data source failed
    #[error("Page fetch failed: {0:#}")]
    PageFetch(anyhow::Error),
}

// == Backend Error Enum ==
/// Failure of a single backend call.
///
/// Only ever seen by the remote adapter, which turns it into a miss or a
/// no-op. It never reaches `CacheManager` callers.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Network or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not complete within the configured timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with something we could not interpret
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The backend is known to be down
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the arguments
    #[error("Rejected: {0}")]
    Rejected(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(Duration::ZERO)
        } else if err.is_connection_refusal() || err.is_connection_dropped() {
            BackendError::Unavailable(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::PageFetch(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::{CacheError, Result};
use crate::manager::CacheManager;
use crate::models::{
    ClearRequest, ClearResponse, EntriesQuery, EntriesResponse, HealthResponse, ResetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
}

impl AppState {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let cache = CacheManager::from_config(config)?;
        Ok(Self::new(Arc::new(cache)))
    }
}

/// Handler for GET /health
///
/// Probes the remote tier when one is configured.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let remote_healthy = state.cache.is_remote_healthy().await;
    Json(HealthResponse::healthy(
        state.cache.backend_name(),
        remote_healthy,
    ))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /entries?pattern=
pub async fn entries_handler(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> Json<EntriesResponse> {
    Json(state.cache.entries(&query.pattern).await.into())
}

/// Handler for POST /clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.clear_matching(&req.pattern).await;
    Ok(Json(ClearResponse::new(req.pattern, removed)))
}

/// Handler for POST /reset
pub async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    let removed = state.cache.reset().await;
    Json(ResetResponse::new(removed))
}

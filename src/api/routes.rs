//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, entries_handler, health_handler, reset_handler, stats_handler, AppState,
};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health` - Health check, including a remote probe
/// - `GET /stats` - Hit/miss statistics
/// - `GET /entries?pattern=` - Local entry metadata
/// - `POST /clear` - Pattern invalidation
/// - `POST /reset` - Drop everything and zero counters
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/entries", get(entries_handler))
        .route("/clear", post(clear_handler))
        .route("/reset", post(reset_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! API Module
//!
//! Admin HTTP surface over a cache manager, for health checks and
//! operational tooling rather than ordinary request paths.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Get cache statistics
//! - `GET /entries?pattern=` - List live local entries
//! - `POST /clear` - Clear entries matching a pattern
//! - `POST /reset` - Clear everything and reset counters

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

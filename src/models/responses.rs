//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{EntryInfo, StatsSnapshot};

/// Response body for POST /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub pattern: String,
    /// Local entries removed
    pub removed: usize,
}

impl ClearResponse {
    pub fn new(pattern: impl Into<String>, removed: usize) -> Self {
        Self {
            pattern: pattern.into(),
            removed,
        }
    }
}

/// Response body for POST /reset
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub removed: usize,
}

impl ResetResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: format!("Cache reset, {} entries dropped", removed),
            removed,
        }
    }
}

/// Response body for GET /entries
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<EntryInfo>,
}

impl From<Vec<EntryInfo>> for EntriesResponse {
    fn from(entries: Vec<EntryInfo>) -> Self {
        Self {
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Entries currently held locally
    pub entry_count: usize,
    pub approx_memory_bytes: usize,
    /// Entries removed because their TTL elapsed
    pub expired: u64,
    pub backend: String,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            entry_count: stats.entry_count,
            approx_memory_bytes: stats.approx_memory_bytes,
            expired: stats.expired,
            backend: stats.backend,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub backend: String,
    /// None when running local-only
    pub remote_healthy: Option<bool>,
}

impl HealthResponse {
    /// A degraded remote still reports "healthy": the local tier serves.
    pub fn healthy(backend: impl Into<String>, remote_healthy: Option<bool>) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            backend: backend.into(),
            remote_healthy,
        }
    }
}

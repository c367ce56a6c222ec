//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;

/// Request body for POST /clear
///
/// # Fields
/// - `pattern`: substring matched against the logical part of each key
#[derive(Debug, Clone, Deserialize)]
pub struct ClearRequest {
    pub pattern: String,
}

impl ClearRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    /// An empty pattern would wipe everything; that is what /reset is for.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty; use /reset to clear everything".to_string());
        }
        None
    }
}

/// Query string for GET /entries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesQuery {
    #[serde(default)]
    pub pattern: String,
}

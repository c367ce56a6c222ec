//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// URL schemes accepted for the remote endpoint.
const REMOTE_SCHEMES: [&str; 4] = ["redis", "rediss", "redis+unix", "unix"];

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote cache endpoint; `None` runs local-only
    pub remote_endpoint: Option<String>,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Upper bound on any single remote call, in milliseconds
    pub remote_timeout_ms: u64,
    /// Seconds to skip the remote after a failure (0 disables)
    pub remote_cooldown_secs: u64,
    /// Prefix for every derived key
    pub namespace: String,
    /// Records per page for the lazy pager
    pub page_size: u64,
    /// TTL in seconds for cached pages
    pub page_ttl: u64,
    /// Entry count at which inserts purge expired entries first
    pub sweep_threshold: usize,
    /// Background sweeper interval in seconds
    pub cleanup_interval: u64,
    /// Admin HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_REMOTE_ENDPOINT` (or `REDIS_URL`) - Remote endpoint (default: none)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `REMOTE_TIMEOUT_MS` - Remote call timeout (default: 250)
    /// - `REMOTE_COOLDOWN_SECS` - Remote skip window after failure (default: 5)
    /// - `CACHE_NAMESPACE` - Key namespace (default: dual_cache)
    /// - `PAGE_SIZE` - Pager page size (default: 50)
    /// - `PAGE_TTL` - Pager TTL in seconds (default: 1800)
    /// - `SWEEP_THRESHOLD` - Insert-time sweep threshold (default: 10000)
    /// - `CLEANUP_INTERVAL` - Sweeper frequency in seconds (default: 30)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    ///
    /// Unparsable values are rejected rather than replaced by defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let remote_endpoint = env::var("CACHE_REMOTE_ENDPOINT")
            .or_else(|_| env::var("REDIS_URL"))
            .ok()
            .filter(|v| !v.trim().is_empty());

        let config = Self {
            remote_endpoint,
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl)?,
            remote_timeout_ms: env_or("REMOTE_TIMEOUT_MS", defaults.remote_timeout_ms)?,
            remote_cooldown_secs: env_or("REMOTE_COOLDOWN_SECS", defaults.remote_cooldown_secs)?,
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            page_size: env_or("PAGE_SIZE", defaults.page_size)?,
            page_ttl: env_or("PAGE_TTL", defaults.page_ttl)?,
            sweep_threshold: env_or("SWEEP_THRESHOLD", defaults.sweep_threshold)?,
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval)?,
            server_port: env_or("SERVER_PORT", defaults.server_port)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("DEFAULT_TTL", self.default_ttl),
            ("REMOTE_TIMEOUT_MS", self.remote_timeout_ms),
            ("PAGE_SIZE", self.page_size),
            ("PAGE_TTL", self.page_ttl),
            ("CLEANUP_INTERVAL", self.cleanup_interval),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CacheError::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if self.namespace.is_empty() || self.namespace.contains(char::is_whitespace) {
            return Err(CacheError::Configuration(format!(
                "invalid namespace '{}'",
                self.namespace
            )));
        }

        if let Some(endpoint) = &self.remote_endpoint {
            validate_endpoint(endpoint)?;
        }

        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn remote_cooldown(&self) -> Duration {
        Duration::from_secs(self.remote_cooldown_secs)
    }

    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_endpoint: None,
            default_ttl: 3600,
            remote_timeout_ms: 250,
            remote_cooldown_secs: 5,
            namespace: crate::cache::DEFAULT_NAMESPACE.to_string(),
            page_size: 50,
            page_ttl: 1800,
            sweep_threshold: 10_000,
            cleanup_interval: 30,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CacheError::Configuration(format!("{} has invalid value '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let malformed = || CacheError::Configuration(format!("malformed remote endpoint '{}'", endpoint));

    let (scheme, rest) = endpoint.split_once("://").ok_or_else(malformed)?;
    if !REMOTE_SCHEMES.contains(&scheme) || rest.is_empty() {
        return Err(malformed());
    }
    Ok(())
}

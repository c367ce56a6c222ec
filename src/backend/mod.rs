//! Backend Module
//!
//! The store seam shared by the local and remote tiers, plus the remote
//! adapter that keeps transport failures away from callers.
//!
//! # Backends
//! - [`LocalStore`](crate::cache::LocalStore): in-process table
//! - [`RedisStore`]: network cache server (feature `redis`)
//! - [`NoopRemote`]: always misses

mod remote;

#[cfg(feature = "redis")]
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

pub use remote::RemoteAdapter;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

// == Backend Trait ==
/// Minimal key/value surface every store provides.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Inserts or replaces the value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), BackendError>;

    /// Returns `true` if the key existed and was deleted.
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;
}

// == Remote Store Trait ==
/// A backend that may live across the network.
#[async_trait]
pub trait RemoteStore: Backend {
    /// Cheap round-trip check.
    async fn ping(&self) -> bool;

    /// Removes keys matching `pattern` (see [`key_matches`](crate::cache::key_matches)).
    ///
    /// Stores without pattern support remove nothing.
    async fn clear_matching(&self, _pattern: &str) -> Result<usize, BackendError> {
        Ok(0)
    }

    /// Short name used in stats and logs.
    fn name(&self) -> &'static str;
}

// == No-Op Remote ==
/// A remote that stores nothing and always misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRemote;

#[async_trait]
impl Backend for NoopRemote {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), BackendError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, BackendError> {
        Ok(false)
    }
}

#[async_trait]
impl RemoteStore for NoopRemote {
    async fn ping(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

//! Redis-backed remote store
//!
//! Requires the `redis` feature to be enabled.

use std::time::Duration;

use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client, RedisResult};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{Backend, RemoteStore};
use crate::cache::key_matches;
use crate::error::{BackendError, CacheError, Result};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 500;

/// Redis remote store.
///
/// Connects lazily through a multiplexed connection and reconnects on the
/// next call after a connection-level failure.
pub struct RedisStore {
    client: Client,
    /// Keys outside this namespace are never touched by pattern deletes
    namespace: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Validates the endpoint and prepares a client. Does not connect.
    pub fn open(url: &str, namespace: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| {
            CacheError::Configuration(format!("invalid remote endpoint '{}': {}", url, e))
        })?;

        Ok(Self {
            client,
            namespace: namespace.into(),
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> std::result::Result<MultiplexedConnection, BackendError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Redis connection established");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Converts a command result, forgetting the connection if it broke.
    async fn settle<T>(&self, result: RedisResult<T>) -> std::result::Result<T, BackendError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
                    *self.conn.lock().await = None;
                }
                Err(err.into())
            }
        }
    }

    /// Every key in our namespace; narrowed client-side by `key_matches`.
    fn namespace_glob(&self) -> String {
        format!("{}:*", escape_glob(&self.namespace))
    }
}

/// Keys the local store would also select for `pattern`.
fn select_matching(keys: Vec<String>, pattern: &str) -> Vec<String> {
    keys.into_iter()
        .filter(|key| key_matches(key, pattern))
        .collect()
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis SETEX takes whole seconds; round up so nothing expires early.
fn ttl_secs(ttl: Duration) -> u64 {
    let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    ms.div_ceil(1000).max(1)
}

#[async_trait]
impl Backend for RedisStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<Option<Vec<u8>>> = conn.get(key).await;
        self.settle(result).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> std::result::Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<()> = conn.set_ex(key, value, ttl_secs(ttl)).await;
        self.settle(result).await
    }

    async fn delete(&self, key: &str) -> std::result::Result<bool, BackendError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<i64> = conn.del(key).await;
        Ok(self.settle(result).await? > 0)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn ping(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: RedisResult<String> = ::redis::cmd("PING").query_async(&mut conn).await;
        matches!(self.settle(result).await, Ok(reply) if reply == "PONG")
    }

    async fn clear_matching(&self, pattern: &str) -> std::result::Result<usize, BackendError> {
        let mut conn = self.connection().await?;
        let glob = self.namespace_glob();

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let result: RedisResult<(u64, Vec<String>)> = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&glob)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next, batch) = self.settle(result).await?;
            keys.extend(select_matching(batch, pattern));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once.
        keys.sort_unstable();
        keys.dedup();
        if keys.is_empty() {
            return Ok(0);
        }

        let result: RedisResult<i64> = conn.del(&keys).await;
        Ok(self.settle(result).await?.max(0) as usize)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

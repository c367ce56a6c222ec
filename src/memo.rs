//! Memoizer
//!
//! Turns an async producer into a cached function keyed by its arguments.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::CacheError;
use crate::manager::CacheManager;

// == Memoizer ==
/// A producer wrapped with read-through caching.
///
/// The logical name stands in for the function's identity and the
/// arguments become the key parameters, so `A` must be serializable.
/// Concurrent misses on the same arguments each run the producer.
pub struct Memoizer<A, T, F> {
    manager: Arc<CacheManager>,
    name: String,
    ttl: Option<Duration>,
    func: F,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T, F> Memoizer<A, T, F> {
    /// Overrides the manager's default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Prepends `prefix` to the logical name.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.name = format!("{}{}", prefix, self.name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<A, T, E, F, Fut> Memoizer<A, T, F>
where
    A: Serialize,
    T: Serialize + DeserializeOwned,
    E: From<CacheError>,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    pub fn new(manager: Arc<CacheManager>, name: impl Into<String>, func: F) -> Self {
        Self {
            manager,
            name: name.into(),
            ttl: None,
            func,
            _marker: PhantomData,
        }
    }

    // == Call ==
    /// Returns the cached result for `args`, running the producer on a miss.
    ///
    /// Producer errors are returned unchanged and nothing is cached.
    pub async fn call(&self, args: A) -> Result<T, E> {
        if let Some(cached) = self.manager.get::<T, A>(&self.name, &args).await? {
            return Ok(cached);
        }

        // Encode before handing the arguments over.
        let params = serde_json::to_value(&args).map_err(CacheError::from)?;
        let value = (self.func)(args).await?;

        debug!("Memoized {}: storing fresh result", self.name);
        self.manager
            .set(&self.name, &value, self.ttl, &params)
            .await?;
        Ok(value)
    }

    /// Drops the cached result for `args`.
    pub async fn invalidate(&self, args: &A) -> Result<bool, E> {
        Ok(self.manager.delete(&self.name, args).await?)
    }
}

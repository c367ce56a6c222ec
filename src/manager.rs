//! Cache Manager
//!
//! Single entry point for applications. Encodes keys, picks the tier,
//! writes through to both tiers and keeps hit/miss statistics.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{RemoteAdapter, RemoteStore};
use crate::cache::{
    CacheStats, Clock, EntryInfo, KeyCodec, LocalStore, StatsSnapshot, SystemClock,
    DEFAULT_NAMESPACE,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::memo::Memoizer;

/// Backend name reported when no remote is configured.
const LOCAL_BACKEND: &str = "local";

// == Cache Manager ==
#[derive(Debug)]
pub struct CacheManager {
    codec: KeyCodec,
    local: Arc<LocalStore>,
    remote: Option<RemoteAdapter>,
    stats: CacheStats,
    default_ttl: Duration,
}

impl CacheManager {
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::default()
    }

    /// Builds a manager from validated configuration.
    ///
    /// With the `redis` feature, a configured endpoint becomes the remote
    /// tier. The endpoint is checked here but not connected to.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .namespace(config.namespace.clone())
            .default_ttl(config.default_ttl())
            .remote_timeout(config.remote_timeout())
            .remote_cooldown(config.remote_cooldown())
            .sweep_threshold(config.sweep_threshold);

        if let Some(endpoint) = &config.remote_endpoint {
            builder = builder.remote(remote_from_endpoint(endpoint, &config.namespace)?);
        }

        builder.build()
    }

    // == Get ==
    /// Raw payload for `(name, params)`.
    ///
    /// Tries the remote first when configured and not cooling down; a
    /// remote miss or failure falls through to the local store. Exactly
    /// one hit or miss is recorded.
    pub async fn get_raw<P>(&self, name: &str, params: &P) -> Result<Option<Vec<u8>>>
    where
        P: Serialize + ?Sized,
    {
        let key = self.codec.encode(name, params)?;

        let mut value = None;
        if let Some(remote) = &self.remote {
            value = remote.get(&key).await;
        }
        if value.is_none() {
            value = self.local.get(&key).await;
        }

        match value {
            Some(_) => {
                self.stats.record_hit();
                debug!("Cache hit: {}", key);
            }
            None => {
                self.stats.record_miss();
                debug!("Cache miss: {}", key);
            }
        }
        Ok(value)
    }

    /// Typed read; payloads are JSON.
    pub async fn get<T, P>(&self, name: &str, params: &P) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        match self.get_raw(name, params).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    // == Set ==
    /// Writes the payload to the remote (best effort) and always locally.
    ///
    /// `ttl` of `None` uses the default TTL; a zero TTL is rejected.
    pub async fn set_raw<P>(
        &self,
        name: &str,
        value: &[u8],
        ttl: Option<Duration>,
        params: &P,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let ttl = self.resolve_ttl(ttl)?;
        let key = self.codec.encode(name, params)?;

        if let Some(remote) = &self.remote {
            remote.set(&key, value, ttl).await;
        }
        self.local.set(&key, value, ttl).await
    }

    /// Typed write; payloads are JSON.
    pub async fn set<T, P>(
        &self,
        name: &str,
        value: &T,
        ttl: Option<Duration>,
        params: &P,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set_raw(name, &bytes, ttl, params).await
    }

    // == Delete ==
    /// Removes the entry from both tiers; true if either held it.
    pub async fn delete<P>(&self, name: &str, params: &P) -> Result<bool>
    where
        P: Serialize + ?Sized,
    {
        let key = self.codec.encode(name, params)?;

        let mut removed = false;
        if let Some(remote) = &self.remote {
            removed |= remote.delete(&key).await;
        }
        removed |= self.local.delete(&key).await;
        Ok(removed)
    }

    // == Clear Matching ==
    /// Removes entries whose logical part contains `pattern` from both tiers.
    ///
    /// Returns the number of local entries removed.
    pub async fn clear_matching(&self, pattern: &str) -> usize {
        if let Some(remote) = &self.remote {
            let remote_removed = remote.clear_matching(pattern).await;
            debug!("Remote clear '{}': removed {} keys", pattern, remote_removed);
        }
        let removed = self.local.clear_matching(pattern).await;
        info!("Cleared {} local entries matching '{}'", removed, pattern);
        removed
    }

    // == Reset ==
    /// Drops every entry in our namespace and zeroes all counters.
    pub async fn reset(&self) -> usize {
        let removed = self.clear_matching("").await;
        self.stats.reset();
        self.local.reset_counters();
        info!("Cache reset: {} entries dropped", removed);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> StatsSnapshot {
        let local = self.local.stats();
        StatsSnapshot {
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            entry_count: local.entry_count,
            approx_memory_bytes: local.approx_memory_bytes,
            expired: local.expired,
            backend: self.backend_name().to_string(),
        }
    }

    /// Local-store metadata for live entries matching `pattern`.
    pub async fn entries(&self, pattern: &str) -> Vec<EntryInfo> {
        self.local.entries_matching(pattern).await
    }

    /// Pings the remote; `None` when running local-only.
    pub async fn is_remote_healthy(&self) -> Option<bool> {
        match &self.remote {
            Some(remote) => Some(remote.is_healthy().await),
            None => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.remote.as_ref().map_or(LOCAL_BACKEND, RemoteAdapter::name)
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Shared handle to the local tier, for the background sweeper.
    pub fn local_store(&self) -> Arc<LocalStore> {
        self.local.clone()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Wraps a producer in a [`Memoizer`] bound to this manager.
    pub fn memoize<A, T, E, F, Fut>(
        self: &Arc<Self>,
        name: impl Into<String>,
        func: F,
    ) -> Memoizer<A, T, F>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        Memoizer::new(self.clone(), name, func)
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<Duration> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.as_millis() == 0 {
            return Err(CacheError::InvalidTtl(format!(
                "TTL must be at least 1ms, got {:?}",
                ttl
            )));
        }
        Ok(ttl)
    }
}

#[cfg(feature = "redis")]
fn remote_from_endpoint(endpoint: &str, namespace: &str) -> Result<Arc<dyn RemoteStore>> {
    let store = crate::backend::RedisStore::open(endpoint, namespace)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
fn remote_from_endpoint(endpoint: &str, _namespace: &str) -> Result<Arc<dyn RemoteStore>> {
    Err(CacheError::Configuration(format!(
        "remote endpoint '{}' configured but the redis feature is disabled",
        endpoint
    )))
}

// == Builder ==
/// Assembles a [`CacheManager`]; `build` validates the settings.
pub struct CacheManagerBuilder {
    namespace: String,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    remote: Option<Arc<dyn RemoteStore>>,
    remote_timeout: Duration,
    remote_cooldown: Duration,
    sweep_threshold: usize,
}

impl Default for CacheManagerBuilder {
    fn default() -> Self {
        let config = Config::default();
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: config.default_ttl(),
            clock: Arc::new(SystemClock),
            remote: None,
            remote_timeout: config.remote_timeout(),
            remote_cooldown: config.remote_cooldown(),
            sweep_threshold: config.sweep_threshold,
        }
    }
}

impl CacheManagerBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn remote(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(store);
        self
    }

    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn remote_cooldown(mut self, cooldown: Duration) -> Self {
        self.remote_cooldown = cooldown;
        self
    }

    pub fn sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<CacheManager> {
        if self.default_ttl.as_millis() == 0 {
            return Err(CacheError::Configuration(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        if self.remote_timeout.is_zero() {
            return Err(CacheError::Configuration(
                "remote timeout must be greater than zero".to_string(),
            ));
        }
        if self.namespace.is_empty() {
            return Err(CacheError::Configuration("namespace cannot be empty".to_string()));
        }

        let local = Arc::new(LocalStore::with_clock(
            self.sweep_threshold,
            self.clock.clone(),
        ));
        let remote = self.remote.map(|store| {
            RemoteAdapter::new(store, self.remote_timeout, self.remote_cooldown, self.clock)
        });

        Ok(CacheManager {
            codec: KeyCodec::new(self.namespace),
            local,
            remote,
            stats: CacheStats::new(),
            default_ttl: self.default_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, NoopRemote};
    use crate::cache::ManualClock;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Remote that fails every call.
    struct Down;

    #[async_trait]
    impl Backend for Down {
        async fn get(&self, _key: &str) -> std::result::Result<Option<Vec<u8>>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Duration,
        ) -> std::result::Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> std::result::Result<bool, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl RemoteStore for Down {
        async fn ping(&self) -> bool {
            false
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn manager() -> (CacheManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let manager = CacheManager::builder()
            .namespace("test")
            .clock(clock.clone())
            .build()
            .unwrap();
        (manager, clock)
    }

    #[tokio::test]
    async fn test_project_health_scenario() {
        let (cache, clock) = manager();
        let five = Some(Duration::from_secs(5));

        cache
            .set("project_health", &json!({"score": 98}), five, &())
            .await
            .unwrap();
        let value: Option<Value> = cache.get("project_health", &()).await.unwrap();
        assert_eq!(value, Some(json!({"score": 98})));

        clock.advance(Duration::from_secs(6));
        let value: Option<Value> = cache.get("project_health", &()).await.unwrap();
        assert!(value.is_none());

        cache
            .set("project_health", &json!({"score": 99}), five, &())
            .await
            .unwrap();
        let value: Option<Value> = cache.get("project_health", &()).await.unwrap();
        assert_eq!(value, Some(json!({"score": 99})));
    }

    #[tokio::test]
    async fn test_stats_accounting() {
        let (cache, _) = manager();
        cache.set("a", &1, None, &()).await.unwrap();

        for _ in 0..3 {
            let _: Option<i32> = cache.get("a", &()).await.unwrap();
        }
        let _: Option<i32> = cache.get("b", &()).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.backend, "local");
    }

    #[tokio::test]
    async fn test_fallback_when_remote_down() {
        let cache = CacheManager::builder()
            .remote(Arc::new(Down))
            .remote_cooldown(Duration::ZERO)
            .build()
            .unwrap();

        cache.set("rfi_summary", &vec![1, 2, 3], None, &json!({"project": 7})).await.unwrap();
        let value: Option<Vec<i32>> = cache.get("rfi_summary", &json!({"project": 7})).await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        let _: Option<Vec<i32>> = cache.get("missing", &()).await.unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.backend, "down");
        assert_eq!(cache.is_remote_healthy().await, Some(false));
    }

    #[tokio::test]
    async fn test_write_through_to_remote() {
        let shared = Arc::new(LocalStore::new(100));
        let writer = CacheManager::builder()
            .remote(shared.clone())
            .build()
            .unwrap();
        let reader = CacheManager::builder()
            .remote(shared.clone())
            .build()
            .unwrap();

        writer.set("cost_summary", &42u32, None, &()).await.unwrap();
        let value: Option<u32> = reader.get("cost_summary", &()).await.unwrap();
        assert_eq!(value, Some(42), "served from the shared remote");
        assert_eq!(shared.len(), 1);
        assert_eq!(writer.local_store().len(), 1);
        assert_eq!(reader.local_store().len(), 0);
    }

    #[tokio::test]
    async fn test_remote_miss_falls_back_to_local() {
        let cache = CacheManager::builder()
            .remote(Arc::new(NoopRemote))
            .build()
            .unwrap();

        cache.set("k", "v", None, &()).await.unwrap();
        let value: Option<String> = cache.get("k", &()).await.unwrap();
        assert_eq!(value.as_deref(), Some("v"));
        assert_eq!(cache.stats().hits, 1);
    }

    /// Shared in-process remote that can be switched off.
    struct Flaky {
        inner: LocalStore,
        down: std::sync::atomic::AtomicBool,
    }

    impl Flaky {
        fn new() -> Self {
            Self {
                inner: LocalStore::new(100),
                down: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn check(&self) -> std::result::Result<(), BackendError> {
            if self.down.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(BackendError::Unavailable("switched off".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for Flaky {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BackendError> {
            self.check()?;
            Backend::get(&self.inner, key).await
        }

        async fn set(
            &self,
            key: &str,
            value: &[u8],
            ttl: Duration,
        ) -> std::result::Result<(), BackendError> {
            self.check()?;
            Backend::set(&self.inner, key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<bool, BackendError> {
            self.check()?;
            Backend::delete(&self.inner, key).await
        }
    }

    #[async_trait]
    impl RemoteStore for Flaky {
        async fn ping(&self) -> bool {
            self.check().is_ok()
        }

        async fn clear_matching(&self, pattern: &str) -> std::result::Result<usize, BackendError> {
            self.check()?;
            RemoteStore::clear_matching(&self.inner, pattern).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_writes_during_outage_only_reach_local() {
        let remote = Arc::new(Flaky::new());
        let cache = CacheManager::builder()
            .remote(remote.clone())
            .remote_cooldown(Duration::ZERO)
            .build()
            .unwrap();

        cache.set("budget", &1u32, None, &()).await.unwrap();
        remote.down.store(true, std::sync::atomic::Ordering::SeqCst);
        cache.set("budget", &2u32, None, &()).await.unwrap();
        let during: Option<u32> = cache.get("budget", &()).await.unwrap();
        assert_eq!(during, Some(2), "local serves while the remote is down");

        // After recovery the remote still holds the pre-outage value.
        remote.down.store(false, std::sync::atomic::Ordering::SeqCst);
        let after: Option<u32> = cache.get("budget", &()).await.unwrap();
        assert_eq!(after, Some(1));

        // A pattern clear drops it from both tiers.
        cache.clear_matching("budget").await;
        let cleared: Option<u32> = cache.get("budget", &()).await.unwrap();
        assert_eq!(cleared, None);
    }

    #[tokio::test]
    async fn test_overwrite_returns_latest() {
        let (cache, _) = manager();
        cache.set("k", "v1", None, &()).await.unwrap();
        cache.set("k", "v2", None, &()).await.unwrap();
        let value: Option<String> = cache.get("k", &()).await.unwrap();
        assert_eq!(value.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_pattern_clear() {
        let (cache, _) = manager();
        for name in ["rfi_summary", "cost_summary", "rfi_detail"] {
            cache.set(name, name, None, &()).await.unwrap();
        }

        assert_eq!(cache.clear_matching("rfi").await, 2);

        let cost: Option<String> = cache.get("cost_summary", &()).await.unwrap();
        assert_eq!(cost.as_deref(), Some("cost_summary"));
        let rfi: Option<String> = cache.get("rfi_summary", &()).await.unwrap();
        assert!(rfi.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (cache, _) = manager();
        cache.set("k", &1, None, &json!({"a": 1})).await.unwrap();

        assert!(!cache.delete("k", &json!({"a": 2})).await.unwrap());
        assert!(cache.delete("k", &json!({"a": 1})).await.unwrap());
        let value: Option<i32> = cache.get("k", &json!({"a": 1})).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_entries_and_counters() {
        let (cache, _) = manager();
        cache.set("a", &1, None, &()).await.unwrap();
        cache.set("b", &2, None, &()).await.unwrap();
        let _: Option<i32> = cache.get("a", &()).await.unwrap();

        assert_eq!(cache.reset().await, 2);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entry_count), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let (cache, _) = manager();
        let result = cache.set("k", &1, Some(Duration::ZERO), &()).await;
        assert!(matches!(result, Err(CacheError::InvalidTtl(_))));
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_serialization_error() {
        let (cache, _) = manager();
        cache.set("k", "text", None, &()).await.unwrap();
        let result: Result<Option<u64>> = cache.get("k", &()).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_builder_rejects_bad_settings() {
        assert!(matches!(
            CacheManager::builder().default_ttl(Duration::ZERO).build(),
            Err(CacheError::Configuration(_))
        ));
        assert!(CacheManager::builder()
            .remote_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(CacheManager::builder().namespace("").build().is_err());
    }

    #[test]
    fn test_from_config_rejects_malformed_endpoint() {
        let config = Config {
            remote_endpoint: Some("localhost:6379".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            CacheManager::from_config(&config),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config_local_only() {
        let cache = CacheManager::from_config(&Config::default()).unwrap();
        assert_eq!(cache.backend_name(), "local");
        assert_eq!(cache.default_ttl(), Duration::from_secs(3600));
    }
}

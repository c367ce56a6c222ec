//! Remote Adapter
//!
//! Wraps a [`RemoteStore`] so that every call is time-bounded and every
//! failure degrades to a miss or a no-op.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::RemoteStore;
use crate::cache::Clock;
use crate::error::BackendError;

/// At most one failure warning per window; the rest go to debug.
const LOG_THROTTLE: Duration = Duration::from_secs(30);

// == Remote Adapter ==
pub struct RemoteAdapter {
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
    /// Skip window after a failure; zero always retries
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    down_until_ms: AtomicU64,
    last_warn_ms: AtomicU64,
    failures: AtomicU64,
}

impl RemoteAdapter {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        timeout: Duration,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            timeout,
            cooldown,
            clock,
            down_until_ms: AtomicU64::new(0),
            last_warn_ms: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.store.name()
    }

    /// Total failed calls since construction.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// False while cooling down after a failure.
    pub fn is_available(&self) -> bool {
        self.clock.now_ms() >= self.down_until_ms.load(Ordering::Relaxed)
    }

    // == Get ==
    /// Remote value, or `None` on miss, failure, timeout or cooldown.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.call("get", self.store.get(key)).await.flatten()
    }

    // == Set ==
    /// Best-effort write; returns whether the remote accepted it.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> bool {
        self.call("set", self.store.set(key, value, ttl))
            .await
            .is_some()
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> bool {
        self.call("delete", self.store.delete(key))
            .await
            .unwrap_or(false)
    }

    pub async fn clear_matching(&self, pattern: &str) -> usize {
        self.call("clear_matching", self.store.clear_matching(pattern))
            .await
            .unwrap_or(0)
    }

    // == Health ==
    /// Pings the remote, bounded by the call timeout.
    ///
    /// A successful ping ends any cooldown early.
    pub async fn is_healthy(&self) -> bool {
        let healthy = matches!(
            tokio::time::timeout(self.timeout, self.store.ping()).await,
            Ok(true)
        );
        if healthy {
            self.mark_up();
        }
        healthy
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        if !self.is_available() {
            debug!("Remote {} skipped for {}: cooling down", self.name(), op);
            return None;
        }

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => {
                self.mark_up();
                Some(value)
            }
            Ok(Err(err)) => {
                self.mark_down(op, &err);
                None
            }
            Err(_) => {
                self.mark_down(op, &BackendError::Timeout(self.timeout));
                None
            }
        }
    }

    fn mark_up(&self) {
        let was_down = self.down_until_ms.swap(0, Ordering::Relaxed) != 0;
        if was_down {
            info!("Remote {} reachable again", self.name());
        }
    }

    fn mark_down(&self, op: &str, err: &BackendError) {
        let now = self.clock.now_ms();
        self.failures.fetch_add(1, Ordering::Relaxed);
        if !self.cooldown.is_zero() {
            let cooldown_ms = u64::try_from(self.cooldown.as_millis()).unwrap_or(u64::MAX);
            let until = now.saturating_add(cooldown_ms);
            self.down_until_ms.store(until, Ordering::Relaxed);
        }

        let last = self.last_warn_ms.load(Ordering::Relaxed);
        let throttled = last != 0 && now.saturating_sub(last) < LOG_THROTTLE.as_millis() as u64;
        if throttled {
            debug!("Remote {} {} failed, using local store: {}", self.name(), op, err);
        } else {
            self.last_warn_ms.store(now.max(1), Ordering::Relaxed);
            warn!(
                "Remote {} {} failed, using local store: {} ({} failures so far)",
                self.name(),
                op,
                err,
                self.failures()
            );
        }
    }
}

impl std::fmt::Debug for RemoteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAdapter")
            .field("store", &self.name())
            .field("timeout", &self.timeout)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

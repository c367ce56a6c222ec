//! Local Store Module
//!
//! In-process TTL store: a HashMap behind a tokio RwLock with lazy
//! expiration on read and an optional sweep on insert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{Backend, RemoteStore};
use crate::cache::key::key_matches;
use crate::cache::{CacheEntry, Clock, EntryInfo, LocalStats, SystemClock};
use crate::error::{BackendError, Result};

// == Local Store ==
/// Thread-safe in-process store with TTL semantics.
#[derive(Debug)]
pub struct LocalStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    /// Insert-time purge kicks in at this many entries
    sweep_threshold: usize,
    // Maintained under the write lock so stats() never waits on it.
    entry_count: AtomicUsize,
    approx_bytes: AtomicUsize,
    expired: AtomicU64,
}

impl LocalStore {
    // == Constructor ==
    /// Creates an empty store on the system clock.
    pub fn new(sweep_threshold: usize) -> Self {
        Self::with_clock(sweep_threshold, Arc::new(SystemClock))
    }

    pub fn with_clock(sweep_threshold: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            sweep_threshold,
            entry_count: AtomicUsize::new(0),
            approx_bytes: AtomicUsize::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// A stale entry is removed on the way out. The removal re-checks the
    /// entry under the write lock, so a concurrent fresh `set` of the same
    /// key is never thrown away.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            let now = self.clock.now_ms();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => {
                    entry.record_hit(now);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        let now = self.clock.now_ms();
        match entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => {
                entry.record_hit(now);
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        if let Some(stale) = entries.remove(key) {
            self.expired.fetch_add(1, Ordering::Relaxed);
            self.account_removed(&stale, entries.len());
            debug!("Local store: dropped expired entry {}", key);
        }
        None
    }

    // == Set ==
    /// Inserts or replaces the entry under `key`, expiring `ttl` from now.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        let now = self.clock.now_ms();
        let entry = CacheEntry::new(key.to_string(), value.to_vec(), now, ttl)?;

        if entries.len() >= self.sweep_threshold && !entries.contains_key(key) {
            let purged = self.purge_expired(&mut entries, now);
            if purged > 0 {
                debug!("Local store: insert sweep removed {} expired entries", purged);
            }
        }

        let size = entry.approx_size();
        if let Some(old) = entries.insert(key.to_string(), entry) {
            self.approx_bytes.fetch_sub(old.approx_size(), Ordering::Relaxed);
        }
        self.approx_bytes.fetch_add(size, Ordering::Relaxed);
        self.entry_count.store(entries.len(), Ordering::Relaxed);

        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key, returning whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(old) => {
                self.account_removed(&old, entries.len());
                true
            }
            None => false,
        }
    }

    // == Clear Matching ==
    /// Removes every entry whose key contains `pattern` (digest excluded).
    pub async fn clear_matching(&self, pattern: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let mut freed = 0;
        entries.retain(|key, entry| {
            let keep = !key_matches(key, pattern);
            if !keep {
                freed += entry.approx_size();
            }
            keep
        });

        self.approx_bytes.fetch_sub(freed, Ordering::Relaxed);
        self.entry_count.store(entries.len(), Ordering::Relaxed);
        before - entries.len()
    }

    /// Removes every entry.
    pub async fn clear(&self) -> usize {
        self.clear_matching("").await
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = self.clock.now_ms();
        self.purge_expired(&mut entries, now)
    }

    // == Inspect ==
    /// Metadata for a live entry, without counting as a read.
    pub async fn inspect(&self, key: &str) -> Option<EntryInfo> {
        let entries = self.entries.read().await;
        let now = self.clock.now_ms();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(CacheEntry::info)
    }

    /// Metadata for every live entry matching `pattern`, sorted by key.
    pub async fn entries_matching(&self, pattern: &str) -> Vec<EntryInfo> {
        let entries = self.entries.read().await;
        let now = self.clock.now_ms();
        let mut infos: Vec<EntryInfo> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired_at(now) && key_matches(key, pattern))
            .map(|(_, entry)| entry.info())
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    // == Stats ==
    /// Size figures; lock-free.
    pub fn stats(&self) -> LocalStats {
        LocalStats {
            entry_count: self.entry_count.load(Ordering::Relaxed),
            approx_memory_bytes: self.approx_bytes.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counters(&self) {
        self.expired.store(0, Ordering::Relaxed);
    }

    // == Length ==
    /// Returns the number of entries physically present.
    pub fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self, entries: &mut HashMap<String, CacheEntry>, now: u64) -> usize {
        let before = entries.len();
        let mut freed = 0;
        entries.retain(|_, entry| {
            let live = !entry.is_expired_at(now);
            if !live {
                freed += entry.approx_size();
            }
            live
        });

        let removed = before - entries.len();
        self.approx_bytes.fetch_sub(freed, Ordering::Relaxed);
        self.entry_count.store(entries.len(), Ordering::Relaxed);
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn account_removed(&self, entry: &CacheEntry, remaining: usize) {
        self.approx_bytes.fetch_sub(entry.approx_size(), Ordering::Relaxed);
        self.entry_count.store(remaining, Ordering::Relaxed);
    }
}

// == Backend Implementations ==
#[async_trait]
impl Backend for LocalStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BackendError> {
        Ok(LocalStore::get(self, key).await)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> std::result::Result<(), BackendError> {
        LocalStore::set(self, key, value, ttl)
            .await
            .map_err(|e| BackendError::Rejected(e.to_string()))
    }

    async fn delete(&self, key: &str) -> std::result::Result<bool, BackendError> {
        Ok(LocalStore::delete(self, key).await)
    }
}

/// A local store can stand in as the remote tier, e.g. to share one
/// in-process table between several managers.
#[async_trait]
impl RemoteStore for LocalStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn clear_matching(&self, pattern: &str) -> std::result::Result<usize, BackendError> {
        Ok(LocalStore::clear_matching(self, pattern).await)
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

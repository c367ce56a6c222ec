//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// A single cached payload and its metadata.
///
/// The payload is opaque bytes. Read counters are atomics so that a hit
/// can be recorded while holding only a shared lock on the table.
#[derive(Debug)]
pub struct CacheEntry {
    /// The derived key this entry lives under
    pub key: String,
    /// The stored payload
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), always > created_at
    pub expires_at: u64,
    hit_count: AtomicU64,
    last_accessed_at: AtomicU64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` after `now_ms`.
    ///
    /// A TTL under one millisecond is rejected: it would make the entry
    /// expire at its own creation instant.
    pub fn new(key: String, value: Vec<u8>, now_ms: u64, ttl: Duration) -> Result<Self> {
        let ttl_ms = ttl.as_millis();
        if ttl_ms == 0 {
            return Err(CacheError::InvalidTtl(format!(
                "TTL for '{}' must be at least 1ms, got {:?}",
                key, ttl
            )));
        }

        Ok(Self {
            key,
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms.min(u64::MAX as u128) as u64),
            hit_count: AtomicU64::new(0),
            last_accessed_at: AtomicU64::new(now_ms),
        })
    }

    // == Is Expired ==
    /// Checks whether the entry is expired at `now_ms`.
    ///
    /// An entry is expired once `now_ms >= expires_at`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Records a successful read.
    pub fn record_hit(&self, now_ms: u64) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
        self.last_accessed_at.fetch_max(now_ms, Ordering::Relaxed);
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed_at.load(Ordering::Relaxed)
    }

    /// Remaining TTL in milliseconds at `now_ms`, zero once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }

    /// Rough number of bytes this entry holds.
    pub fn approx_size(&self) -> usize {
        self.key.len() + self.value.len() + mem::size_of::<Self>()
    }

    /// Read-only snapshot for admin tooling.
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            size_bytes: self.value.len(),
            created_at: to_datetime(self.created_at),
            expires_at: to_datetime(self.expires_at),
            last_accessed_at: to_datetime(self.last_accessed_at()),
            hit_count: self.hit_count(),
        }
    }
}

// == Entry Info ==
/// Snapshot of an entry's metadata, without the payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryInfo {
    pub key: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub hit_count: u64,
}

fn to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}

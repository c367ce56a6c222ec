//! Cache Module
//!
//! In-process building blocks: entries, key derivation, clocks, counters
//! and the local TTL store.

mod clock;
mod entry;
mod key;
mod local;
mod stats;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryInfo};
pub use key::{key_matches, KeyCodec};
pub use local::LocalStore;
pub use stats::{CacheStats, LocalStats, StatsSnapshot};

// == Public Constants ==
/// Maximum allowed logical name length in bytes
pub const MAX_NAME_LENGTH: usize = 256;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "dual_cache";

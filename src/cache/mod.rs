//! Cache Module
//!
//! Provides an in-memory key-value cache with TTL expiration, optimistic
//! versioning and pluggable eviction (LRU, LFU, FIFO).

mod clock;
mod entry;
mod eviction;
mod expiry;
mod listener;
mod stats;
mod store;
mod table;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use eviction::{
    EvictionPolicy, EvictionPolicyKind, FifoPolicy, LfuPolicy, LruPolicy, Policy,
};
pub use expiry::{ExpiryTracker, PopExpired};
pub use listener::{RemovalCause, RemovalListener, RemovalNotification};
pub use stats::{CacheStats, StatsCollector};
pub use store::CacheStore;
pub use table::{Entries, EntryTable, PutOutcome, Shard};

// == Public Constants ==
/// Default maximum key length in bytes
pub const DEFAULT_MAX_KEY_SIZE: usize = 256;

/// Default maximum value size in bytes
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

//! Membase - an embeddable in-memory key-value cache
//!
//! Provides a thread-safe cache with per-entry TTL expiration, optimistic
//! versioning via compare-and-swap and pluggable eviction (LRU, LFU, FIFO).

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, CacheStore, EvictionPolicyKind};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweeper_task;

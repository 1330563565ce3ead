//! Cache Entry Module
//!
//! Defines the stored record for one key.

use bytes::Bytes;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: Bytes,
    /// The stored value, opaque to the cache
    pub value: Bytes,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Bumped on every successful mutation, never reused for the same key
    pub version: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry at version 1. The table renumbers fresh entries so a
    /// re-created key continues above its earlier versions.
    pub fn new(key: Bytes, value: Bytes, now: u64, expires_at: Option<u64>) -> Self {
        Self {
            key,
            value,
            created_at: now,
            expires_at,
            version: 1,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// Returns `Some(0)` once the entry has expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }

    // == Replace ==
    /// Overwrites value and deadline in place and bumps the version.
    pub(crate) fn replace(&mut self, value: Bytes, expires_at: Option<u64>) -> u64 {
        self.value = value;
        self.expires_at = expires_at;
        self.version += 1;
        self.version
    }
}

//! Entry Table Module
//!
//! Sharded key → entry index. Each shard is an independent `RwLock` holding
//! its entries and the expiry tracker for those entries, so expiry lookups
//! are serialized exactly like the entries they describe.
//!
//! The table never touches eviction bookkeeping and never removes an expired
//! entry on its own: reads report what is stored, and callers decide what
//! "dead" means at their `now`.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cache::{CacheEntry, ExpiryTracker};
use crate::error::{CacheError, Result};

/// Compact a shard's tracker once it holds this many pairs per entry...
const TRACKER_COMPACT_FACTOR: usize = 2;
/// ...plus this many.
const TRACKER_COMPACT_SLACK: usize = 64;

/// Result of a successful [`Shard::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub version: u64,
    /// The entry as it was before the write, live or expired.
    pub previous: Option<CacheEntry>,
}

// == Shard ==
#[derive(Debug, Default)]
pub struct Shard {
    entries: HashMap<Bytes, CacheEntry>,
    expiry: ExpiryTracker,
    /// Highest version of any entry that has left this shard. Fresh entries
    /// start above it, so a key's version never repeats across lifecycles.
    retired_version: u64,
}

impl Shard {
    /// Stored entry, expired or not.
    pub fn get(&self, key: &[u8]) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Stored entry if it is still live at `now`.
    pub fn get_live(&self, key: &[u8], now: u64) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|e| !e.is_expired_at(now))
    }

    /// Removes the entry only if it is dead at `now`.
    pub fn take_expired(&mut self, key: &[u8], now: u64) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => self.remove(key),
            _ => None,
        }
    }

    /// Inserts or overwrites.
    ///
    /// A live entry is mutated in place and its version bumped; a missing or
    /// expired one is replaced by a fresh entry numbered above every version
    /// this shard has retired.
    pub fn put(
        &mut self,
        key: Bytes,
        value: Bytes,
        expires_at: Option<u64>,
        now: u64,
    ) -> PutOutcome {
        if let Some(at) = expires_at {
            self.expiry.schedule_expiry(key.clone(), at);
        }

        let outcome = match self.entries.get_mut(&key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let previous = entry.clone();
                let version = entry.replace(value, expires_at);
                PutOutcome {
                    version,
                    previous: Some(previous),
                }
            }
            _ => {
                let previous = self.remove(&key);
                let mut entry = CacheEntry::new(key.clone(), value, now, expires_at);
                entry.version = self.retired_version + 1;
                let version = entry.version;
                self.entries.insert(key, entry);
                PutOutcome { version, previous }
            }
        };

        self.maybe_compact_expiry();
        outcome
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.retire(&entry);
        Some(entry)
    }

    /// Replaces the value of a live entry if its version matches. The
    /// deadline is kept. Returns the new version and the replaced value.
    pub fn compare_and_swap(
        &mut self,
        key: &[u8],
        expected_version: u64,
        value: Bytes,
        now: u64,
    ) -> Result<(u64, Bytes)> {
        let entry = match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => entry,
            _ => return Err(CacheError::NotFound),
        };
        if entry.version != expected_version {
            return Err(CacheError::VersionMismatch {
                expected: expected_version,
                actual: entry.version,
            });
        }

        let old_value = std::mem::replace(&mut entry.value, value);
        entry.version += 1;
        Ok((entry.version, old_value))
    }

    /// Removes up to `limit` entries whose scheduled deadline is due.
    pub fn pop_expired(&mut self, now: u64, limit: usize) -> Vec<CacheEntry> {
        let entries = &mut self.entries;
        let mut removed = Vec::new();
        // removing inside the predicate turns a duplicate pair into a tombstone
        self.expiry
            .pop_expired_before(now, |key, at| {
                if !entries.get(key).is_some_and(|e| e.expires_at == Some(at)) {
                    return false;
                }
                removed.extend(entries.remove(key));
                true
            })
            .take(limit)
            .for_each(drop);
        for entry in &removed {
            self.retire(entry);
        }
        removed
    }

    /// Clones of every entry still live at `now`.
    pub fn live_entries(&self, now: u64) -> Vec<CacheEntry> {
        self.entries
            .values()
            .filter(|e| !e.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Empties the shard, returning what it held.
    pub fn drain(&mut self) -> Vec<CacheEntry> {
        self.expiry.clear();
        let drained: Vec<CacheEntry> = self.entries.drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            self.retire(entry);
        }
        drained
    }

    /// Physically present entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if some scheduled deadline is due at `now`. May report a
    /// tombstone, never misses a live due entry.
    pub fn has_due_expiry(&self, now: u64) -> bool {
        self.expiry.next_expiry().is_some_and(|at| at <= now)
    }

    /// Scheduled expiry pairs, tombstones included.
    pub fn pending_expiries(&self) -> usize {
        self.expiry.len()
    }

    fn retire(&mut self, entry: &CacheEntry) {
        self.retired_version = self.retired_version.max(entry.version);
    }

    fn maybe_compact_expiry(&mut self) {
        let limit = self.entries.len() * TRACKER_COMPACT_FACTOR + TRACKER_COMPACT_SLACK;
        if self.expiry.len() <= limit {
            return;
        }
        let entries = &self.entries;
        self.expiry
            .retain(|key, at| entries.get(key).is_some_and(|e| e.expires_at == Some(at)));
    }
}

// == Entry Table ==
#[derive(Debug)]
pub struct EntryTable {
    shards: Box<[RwLock<Shard>]>,
    hasher: RandomState,
}

impl EntryTable {
    /// Creates a table with a fixed number of shards (at least one).
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(Shard::default()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_index(&self, key: &[u8]) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    pub fn read(&self, key: &[u8]) -> RwLockReadGuard<'_, Shard> {
        self.shards[self.shard_index(key)].read()
    }

    pub fn write(&self, key: &[u8]) -> RwLockWriteGuard<'_, Shard> {
        self.shards[self.shard_index(key)].write()
    }

    /// Shard by position, for whole-table walks.
    pub fn shard(&self, idx: usize) -> &RwLock<Shard> {
        &self.shards[idx]
    }

    // == Single-key operations ==

    /// Live entry for `key` at `now`.
    pub fn get(&self, key: &[u8], now: u64) -> Option<CacheEntry> {
        self.read(key).get_live(key, now).cloned()
    }

    /// Inserts or overwrites, returning the new version.
    pub fn put(&self, key: Bytes, value: Bytes, expires_at: Option<u64>, now: u64) -> u64 {
        self.write(&key).put(key.clone(), value, expires_at, now).version
    }

    pub fn remove(&self, key: &[u8]) -> Option<CacheEntry> {
        self.write(key).remove(key)
    }

    pub fn compare_and_swap(
        &self,
        key: &[u8],
        expected_version: u64,
        value: Bytes,
        now: u64,
    ) -> Result<u64> {
        self.write(key)
            .compare_and_swap(key, expected_version, value, now)
            .map(|(version, _)| version)
    }

    // == Whole-table operations ==

    /// Physically present entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Lazily walks live entries, snapshotting one shard at a time.
    pub fn entries(&self, now: u64) -> Entries<'_> {
        Entries {
            table: self,
            now,
            next_shard: 0,
            current: Vec::new().into_iter(),
        }
    }
}

/// Iterator returned by [`EntryTable::entries`].
pub struct Entries<'a> {
    table: &'a EntryTable,
    now: u64,
    next_shard: usize,
    current: std::vec::IntoIter<CacheEntry>,
}

impl Iterator for Entries<'_> {
    type Item = CacheEntry;

    fn next(&mut self) -> Option<CacheEntry> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            let shard = self.table.shards.get(self.next_shard)?;
            self.next_shard += 1;
            self.current = shard.read().live_entries(self.now).into_iter();
        }
    }
}

//! Cache Store Module
//!
//! Main cache engine combining the sharded entry table, per-shard expiry
//! tracking and a global eviction policy.
//!
//! # Locking
//!
//! - A key's shard lock is taken first, the policy lock second.
//! - No thread holds two shard locks at once. Eviction picks a victim under
//!   the policy lock, releases it, then locks the victim's shard.
//! - A new key is admitted while holding both its shard lock and the policy
//!   lock, and only if the policy tracks fewer keys than the capacity. The
//!   table insert happens before the shard lock is released, so the number
//!   of stored entries never exceeds the capacity.
//! - Removal listeners run after every lock is released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace};

use crate::cache::clock::deadline_after;
use crate::cache::listener::Listeners;
use crate::cache::{
    CacheEntry, CacheStats, Clock, EntryTable, EvictionPolicy, EvictionPolicyKind, Policy,
    RemovalCause, RemovalNotification, StatsCollector, SystemClock,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Main cache storage with TTL support and pluggable eviction.
///
/// The store is `Send + Sync`; share it between threads with an `Arc`.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage with per-shard expiry tracking
    table: EntryTable,
    /// Global eviction bookkeeping
    policy: Mutex<Policy>,
    /// Performance statistics
    stats: StatsCollector,
    listeners: RwLock<Listeners>,
    clock: Arc<dyn Clock>,
    /// Shard the next sweep starts from
    sweep_cursor: AtomicUsize,
    /// Maximum number of entries allowed
    capacity: usize,
    max_key_size: usize,
    max_value_size: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given capacity, policy and limits.
    /// Every other setting takes its [`Config`] default.
    pub fn new(
        capacity: usize,
        eviction_policy: EvictionPolicyKind,
        max_key_size: usize,
        max_value_size: usize,
    ) -> Result<Self> {
        let config = Config {
            capacity,
            eviction_policy,
            max_key_size,
            max_value_size,
            ..Config::default()
        };
        Self::from_config(&config)
    }

    /// Creates a CacheStore driven by the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a CacheStore that reads time from `clock`.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        info!(
            capacity = config.capacity,
            policy = %config.eviction_policy,
            shards = config.shard_count,
            "cache store initialized"
        );

        Ok(Self {
            table: EntryTable::new(config.shard_count),
            policy: Mutex::new(Policy::new(
                config.eviction_policy,
                config.lfu_max_frequency,
                config.lfu_decay_after,
            )),
            stats: StatsCollector::new(),
            listeners: RwLock::new(Listeners::default()),
            clock,
            sweep_cursor: AtomicUsize::new(0),
            capacity: config.capacity,
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
        })
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `NotFound` if the key is absent or expired. Expired entries
    /// found here are removed and counted as misses.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Bytes> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Like [`get`](Self::get) but returns the whole entry, including the
    /// version to pass to [`compare_and_swap`](Self::compare_and_swap).
    pub fn get_entry(&self, key: impl AsRef<[u8]>) -> Result<CacheEntry> {
        let key = key.as_ref();
        let now = self.now();

        let found_expired = {
            let shard = self.table.read(key);
            match shard.get(key) {
                None => false,
                Some(entry) if entry.is_expired_at(now) => true,
                Some(entry) => {
                    self.policy.lock().record_access(key);
                    self.stats.record_hit();
                    return Ok(entry.clone());
                }
            }
        };

        if found_expired {
            let reaped = {
                let mut shard = self.table.write(key);
                let reaped = shard.take_expired(key, now);
                if reaped.is_some() {
                    self.policy.lock().record_removal(key);
                }
                reaped
            };
            if let Some(entry) = reaped {
                self.stats.record_expirations(1);
                self.notify(vec![removal(entry, RemovalCause::Expired)]);
            }
        }

        trace!("cache miss");
        self.stats.record_miss();
        Err(CacheError::NotFound)
    }

    /// True if `key` holds a live entry. Does not count as an access.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        self.table.read(key).get_live(key, self.now()).is_some()
    }

    // == Put ==
    /// Stores a key-value pair with optional TTL and returns its version.
    ///
    /// `None` or a zero TTL means the entry never expires. Overwriting a live
    /// key bumps its version; a new key starts above any version its shard
    /// has handed out before, so versions never repeat. If the cache is full,
    /// an expired entry is reclaimed first and only otherwise a victim chosen
    /// by the eviction policy is evicted.
    pub fn put(
        &self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        ttl: Option<Duration>,
    ) -> Result<u64> {
        let key = key.into();
        let value = value.into();
        self.check_size("key", key.len(), self.max_key_size)?;
        self.check_size("value", value.len(), self.max_value_size)?;

        let mut removed = Vec::new();
        let result = self.put_inner(key, value, ttl, &mut removed);
        self.notify(removed);
        result
    }

    fn put_inner(
        &self,
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
        removed: &mut Vec<RemovalNotification>,
    ) -> Result<u64> {
        loop {
            let now = self.now();
            let expires_at = deadline_after(now, ttl);

            {
                let mut shard = self.table.write(&key);

                if let Some(dead) = shard.take_expired(&key, now) {
                    self.policy.lock().record_removal(&key);
                    self.stats.record_expirations(1);
                    removed.push(removal(dead, RemovalCause::Expired));
                }

                if shard.get(&key).is_some() {
                    let outcome = shard.put(key.clone(), value, expires_at, now);
                    self.policy.lock().record_access(&key);
                    if let Some(previous) = outcome.previous {
                        removed.push(removal(previous, RemovalCause::Replaced));
                    }
                    return Ok(outcome.version);
                }

                let admitted = {
                    let mut policy = self.policy.lock();
                    if policy.len() < self.capacity {
                        policy.record_insertion(key.clone());
                        true
                    } else {
                        false
                    }
                };
                if admitted {
                    let outcome = shard.put(key.clone(), value, expires_at, now);
                    return Ok(outcome.version);
                }
            }

            self.evict_one(removed)?;
        }
    }

    // == Evict ==
    /// Frees one slot, reclaiming an expired entry if there is one and only
    /// otherwise evicting the policy's victim. Returns without evicting if a
    /// slot was freed concurrently or the chosen victim vanished first; the
    /// caller retries either way.
    fn evict_one(&self, removed: &mut Vec<RemovalNotification>) -> Result<()> {
        // a dead entry anywhere frees a slot without touching live data
        if self.reclaim_expired(self.now(), 1, removed) > 0 {
            return Ok(());
        }

        let victim = {
            let policy = self.policy.lock();
            let selected = policy.select_victim();
            match selected {
                Some(victim) => victim,
                None if policy.len() < self.capacity => return Ok(()),
                None => {
                    let tracked = policy.len();
                    drop(policy);
                    return Err(self.consistency_error(format!(
                        "eviction policy tracks {} keys but yielded no victim",
                        tracked
                    )));
                }
            }
        };

        let now = self.now();
        let mut shard = self.table.write(&victim);
        let taken = shard.remove(&victim);
        match taken {
            Some(entry) => {
                self.policy.lock().record_removal(&victim);
                drop(shard);

                let cause = if entry.is_expired_at(now) {
                    self.stats.record_expirations(1);
                    RemovalCause::Expired
                } else {
                    self.stats.record_eviction();
                    RemovalCause::Evicted
                };
                debug!(?cause, key_len = victim.len(), "removed entry to make room");
                removed.push(removal(entry, cause));
                Ok(())
            }
            None => {
                let mut policy = self.policy.lock();
                if policy.contains(&victim) {
                    // drop the orphan so the next attempt can make progress
                    policy.record_removal(&victim);
                    drop(policy);
                    drop(shard);
                    return Err(self.consistency_error(
                        "eviction victim is tracked by the policy but missing from the table"
                            .to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns false if the key was absent or had already expired.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        let now = self.now();

        let removed = {
            let mut shard = self.table.write(key);
            let removed = shard.remove(key);
            if removed.is_some() {
                self.policy.lock().record_removal(key);
            }
            removed
        };

        match removed {
            Some(entry) if entry.is_expired_at(now) => {
                self.stats.record_expirations(1);
                self.notify(vec![removal(entry, RemovalCause::Expired)]);
                false
            }
            Some(entry) => {
                self.notify(vec![removal(entry, RemovalCause::Deleted)]);
                true
            }
            None => false,
        }
    }

    // == Compare And Swap ==
    /// Replaces the value of a live key only if its current version equals
    /// `expected_version`. The entry keeps its expiry time.
    ///
    /// Fails with `VersionMismatch` (and changes nothing) when the versions
    /// differ, or `NotFound` when there is no live entry. Since it never
    /// creates a key, it never needs to evict.
    pub fn compare_and_swap(
        &self,
        key: impl AsRef<[u8]>,
        expected_version: u64,
        new_value: impl Into<Bytes>,
    ) -> Result<u64> {
        let key = key.as_ref();
        let new_value = new_value.into();
        self.check_size("key", key.len(), self.max_key_size)?;
        self.check_size("value", new_value.len(), self.max_value_size)?;

        let now = self.now();
        let mut removed = Vec::new();

        let result = {
            let mut shard = self.table.write(key);

            if let Some(dead) = shard.take_expired(key, now) {
                self.policy.lock().record_removal(key);
                self.stats.record_expirations(1);
                removed.push(removal(dead, RemovalCause::Expired));
            }

            shard
                .compare_and_swap(key, expected_version, new_value, now)
                .map(|(version, old_value)| {
                    self.policy.lock().record_access(key);
                    removed.push(RemovalNotification::new(
                        Bytes::copy_from_slice(key),
                        old_value,
                        RemovalCause::Replaced,
                    ));
                    version
                })
        };

        self.notify(removed);
        result
    }

    // == Sweep Expired ==
    /// Removes every entry whose TTL elapsed at or before `now`.
    ///
    /// Returns the number of entries removed. Not needed for correctness,
    /// since every access already treats expired entries as absent.
    pub fn sweep_expired(&self, now: u64) -> usize {
        self.sweep_expired_bounded(now, usize::MAX)
    }

    /// Like [`sweep_expired`](Self::sweep_expired) but stops after removing
    /// `max_entries`. Successive bounded sweeps start from different shards
    /// so no shard is starved.
    pub fn sweep_expired_bounded(&self, now: u64, max_entries: usize) -> usize {
        let mut removed = Vec::new();
        let total = self.reclaim_expired(now, max_entries, &mut removed);
        if total > 0 {
            debug!(removed = total, "swept expired entries");
        }
        self.notify(removed);
        total
    }

    /// Removes up to `max_entries` expired entries from the table and the
    /// policy, starting at the sweep cursor. Must be called without any lock
    /// held; notifications are left to the caller.
    fn reclaim_expired(
        &self,
        now: u64,
        max_entries: usize,
        removed: &mut Vec<RemovalNotification>,
    ) -> usize {
        let shard_count = self.table.shard_count();
        let start = self.sweep_cursor.load(Ordering::Relaxed) % shard_count;
        let mut total = 0;

        for offset in 0..shard_count {
            if total >= max_entries {
                break;
            }
            let idx = (start + offset) % shard_count;
            let lock = self.table.shard(idx);
            if !lock.read().has_due_expiry(now) {
                continue;
            }

            let expired = {
                let mut shard = lock.write();
                let expired = shard.pop_expired(now, max_entries - total);
                if !expired.is_empty() {
                    let mut policy = self.policy.lock();
                    for entry in &expired {
                        policy.record_removal(&entry.key);
                    }
                }
                expired
            };

            total += expired.len();
            removed.extend(
                expired
                    .into_iter()
                    .map(|entry| removal(entry, RemovalCause::Expired)),
            );
            self.sweep_cursor.store(idx + 1, Ordering::Relaxed);
        }

        if total > 0 {
            self.stats.record_expirations(total as u64);
        }
        total
    }

    // == Clear ==
    /// Removes every entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut removed = Vec::new();

        for idx in 0..self.table.shard_count() {
            let mut shard = self.table.shard(idx).write();
            let drained = shard.drain();
            if drained.is_empty() {
                continue;
            }
            let mut policy = self.policy.lock();
            for entry in &drained {
                policy.record_removal(&entry.key);
            }
            drop(policy);
            drop(shard);
            removed.extend(
                drained
                    .into_iter()
                    .map(|entry| removal(entry, RemovalCause::Cleared)),
            );
        }

        let count = removed.len();
        self.notify(removed);
        count
    }

    // == Entries ==
    /// Lazily iterates `(key, value, expires_at)` of live entries, one shard
    /// snapshot at a time. Entries written to a shard after it was visited
    /// are not seen.
    pub fn entries(&self) -> impl Iterator<Item = (Bytes, Bytes, Option<u64>)> + '_ {
        self.table
            .entries(self.now())
            .map(|entry| (entry.key, entry.value, entry.expires_at))
    }

    // == Listeners ==
    /// Registers a callback invoked for every entry that leaves the cache.
    pub fn add_removal_listener<F>(&self, listener: F)
    where
        F: Fn(&RemovalNotification) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy_kind(&self) -> EvictionPolicyKind {
        self.policy.lock().kind()
    }

    /// Current time according to the store's clock, in Unix milliseconds.
    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn check_size(&self, what: &str, len: usize, max: usize) -> Result<()> {
        if len == 0 || len > max {
            return Err(CacheError::CapacityViolation(format!(
                "{} length {} outside allowed range 1..={}",
                what, len, max
            )));
        }
        Ok(())
    }

    fn consistency_error(&self, message: String) -> CacheError {
        self.stats.record_consistency_error();
        error!(%message, "cache bookkeeping diverged");
        CacheError::InternalConsistency(message)
    }

    fn notify(&self, removed: Vec<RemovalNotification>) {
        if removed.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        if !listeners.is_empty() {
            listeners.notify(&removed);
        }
    }
}

fn removal(entry: CacheEntry, cause: RemovalCause) -> RemovalNotification {
    RemovalNotification::new(entry.key, entry.value, cause)
}

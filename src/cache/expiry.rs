//! Expiry Tracker Module
//!
//! Time-ordered index of `(expires_at, key)` pairs so expired entries can be
//! found without scanning the whole table.
//!
//! Pairs are bucketed by their exact deadline (milliseconds). Overwrites and
//! deletes never touch the tracker: the stale pair stays behind as a
//! tombstone and is skipped when popped, because the key's live entry no
//! longer carries that deadline.
//!
//! ```text
//! buckets: 1000 -> [a, c]   1250 -> [b]   9000 -> [a]
//!          ^ earliest                      ^ latest
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;

// == Expiry Tracker ==
#[derive(Debug, Default)]
pub struct ExpiryTracker {
    buckets: BTreeMap<u64, Vec<Bytes>>,
    len: usize,
}

impl ExpiryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Schedule ==
    /// Records that `key` is due at `expires_at`.
    pub fn schedule_expiry(&mut self, key: Bytes, expires_at: u64) {
        self.buckets.entry(expires_at).or_default().push(key);
        self.len += 1;
    }

    // == Pop Expired ==
    /// Lazily pops every pair due at or before `now`.
    ///
    /// `is_current(key, expires_at)` decides whether a pair still describes a
    /// live entry; pairs for which it returns false are discarded as
    /// tombstones and not yielded. Pairs the caller never pulls from the
    /// iterator stay scheduled.
    pub fn pop_expired_before<F>(&mut self, now: u64, is_current: F) -> PopExpired<'_, F>
    where
        F: FnMut(&Bytes, u64) -> bool,
    {
        PopExpired {
            tracker: self,
            now,
            is_current,
        }
    }

    /// Earliest scheduled deadline, tombstones included.
    pub fn next_expiry(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    /// Drops every pair for which `keep` returns false.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Bytes, u64) -> bool,
    {
        let mut len = 0;
        self.buckets.retain(|at, keys| {
            keys.retain(|key| keep(key, *at));
            len += keys.len();
            !keys.is_empty()
        });
        self.len = len;
    }

    /// Number of scheduled pairs, tombstones included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    fn pop_due(&mut self, now: u64) -> Option<(u64, Bytes)> {
        let mut bucket = self.buckets.first_entry()?;
        let at = *bucket.key();
        if at > now {
            return None;
        }

        let key = bucket.get_mut().pop();
        if bucket.get().is_empty() {
            bucket.remove();
        }

        let key = key?;
        self.len -= 1;
        Some((at, key))
    }
}

/// Iterator returned by [`ExpiryTracker::pop_expired_before`].
pub struct PopExpired<'a, F> {
    tracker: &'a mut ExpiryTracker,
    now: u64,
    is_current: F,
}

impl<F> Iterator for PopExpired<'_, F>
where
    F: FnMut(&Bytes, u64) -> bool,
{
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        while let Some((at, key)) = self.tracker.pop_due(self.now) {
            if (self.is_current)(&key, at) {
                return Some(key);
            }
        }
        None
    }
}

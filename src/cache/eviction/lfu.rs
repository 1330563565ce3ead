//! LFU Policy Module
//!
//! Least Frequently Used eviction. Every tracked key carries an access
//! counter; keys sharing a counter value sit in one bucket list, ordered by
//! when they entered the bucket. The victim is the front of the lowest
//! bucket.
//!
//! Counters saturate at a configured cap, so the number of buckets is bounded
//! and the lowest-bucket lookup is effectively constant. Counters only go
//! down when aging is enabled: after every `decay_after` recorded accesses,
//! all counters are halved (never below 1). That pass relinks every tracked
//! key, so it is O(n) and runs under the caller's policy lock; the other
//! operations are O(1).

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use super::list::{Arena, Links};
use super::EvictionPolicy;

#[derive(Debug)]
pub struct LfuPolicy {
    arena: Arena,
    index: HashMap<Bytes, usize>,
    buckets: BTreeMap<u32, Links>,
    max_frequency: u32,
    decay_after: Option<u64>,
    accesses_since_decay: u64,
}

impl LfuPolicy {
    pub fn new(max_frequency: u32, decay_after: Option<u64>) -> Self {
        Self {
            arena: Arena::default(),
            index: HashMap::new(),
            buckets: BTreeMap::new(),
            max_frequency: max_frequency.max(1),
            decay_after: decay_after.filter(|n| *n > 0),
            accesses_since_decay: 0,
        }
    }

    /// Current counter of a tracked key.
    pub fn frequency(&self, key: &[u8]) -> Option<u32> {
        self.index.get(key).map(|&idx| self.arena.freq(idx))
    }

    fn link(&mut self, idx: usize, freq: u32) {
        self.arena.set_freq(idx, freq);
        self.buckets
            .entry(freq)
            .or_default()
            .push_back(&mut self.arena, idx);
    }

    fn unlink(&mut self, idx: usize) {
        let freq = self.arena.freq(idx);
        let emptied = match self.buckets.get_mut(&freq) {
            Some(bucket) => {
                bucket.unlink(&mut self.arena, idx);
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            self.buckets.remove(&freq);
        }
    }

    fn bump(&mut self, idx: usize) {
        let next = self.arena.freq(idx).saturating_add(1).min(self.max_frequency);
        self.unlink(idx);
        self.link(idx, next);
    }

    fn decay(&mut self) {
        let mut handles = Vec::with_capacity(self.index.len());
        for bucket in self.buckets.values() {
            handles.extend(bucket.iter(&self.arena));
        }
        self.buckets.clear();
        for idx in handles {
            let halved = (self.arena.freq(idx) / 2).max(1);
            self.link(idx, halved);
        }
    }
}

impl Default for LfuPolicy {
    fn default() -> Self {
        Self::new(u8::MAX as u32, None)
    }
}

impl EvictionPolicy for LfuPolicy {
    fn record_access(&mut self, key: &[u8]) {
        let Some(&idx) = self.index.get(key) else {
            return;
        };
        self.bump(idx);

        if let Some(period) = self.decay_after {
            self.accesses_since_decay += 1;
            if self.accesses_since_decay >= period {
                self.accesses_since_decay = 0;
                self.decay();
            }
        }
    }

    fn record_insertion(&mut self, key: Bytes) {
        if self.index.contains_key(&key) {
            self.record_access(&key);
            return;
        }
        let idx = self.arena.alloc(key.clone(), 1);
        self.link(idx, 1);
        self.index.insert(key, idx);
    }

    fn record_removal(&mut self, key: &[u8]) {
        if let Some(idx) = self.index.remove(key) {
            self.unlink(idx);
            self.arena.release(idx);
        }
    }

    fn select_victim(&self) -> Option<Bytes> {
        let (_, bucket) = self.buckets.first_key_value()?;
        bucket.front().map(|idx| self.arena.key(idx).clone())
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.buckets.clear();
        self.accesses_since_decay = 0;
    }
}

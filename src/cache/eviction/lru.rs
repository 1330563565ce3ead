//! LRU Policy Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use bytes::Bytes;

use super::list::KeyOrder;
use super::EvictionPolicy;

// == LRU Policy ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys are kept in a linked order where:
/// - Front = Least recently used (next victim)
/// - Back = Most recently used
///
/// Keys never accessed after insertion keep their insertion order, so ties
/// resolve first-in first-out.
#[derive(Debug, Default)]
pub struct LruPolicy {
    order: KeyOrder,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for LruPolicy {
    fn record_access(&mut self, key: &[u8]) {
        self.order.move_to_back(key);
    }

    fn record_insertion(&mut self, key: Bytes) {
        if self.order.contains(&key) {
            self.order.move_to_back(&key);
        } else {
            self.order.push_back(key);
        }
    }

    fn record_removal(&mut self, key: &[u8]) {
        self.order.remove(key);
    }

    fn select_victim(&self) -> Option<Bytes> {
        self.order.front().cloned()
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.order.contains(key)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

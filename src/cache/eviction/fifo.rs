//! FIFO Policy Module
//!
//! Plain insertion-ordered queue. Accesses do not change the order.

use bytes::Bytes;

use super::list::KeyOrder;
use super::EvictionPolicy;

#[derive(Debug, Default)]
pub struct FifoPolicy {
    queue: KeyOrder,
}

impl FifoPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for FifoPolicy {
    fn record_access(&mut self, _key: &[u8]) {}

    fn record_insertion(&mut self, key: Bytes) {
        self.queue.push_back(key);
    }

    fn record_removal(&mut self, key: &[u8]) {
        self.queue.remove(key);
    }

    fn select_victim(&self) -> Option<Bytes> {
        self.queue.front().cloned()
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.queue.contains(key)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

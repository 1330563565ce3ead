//! Eviction Policy Module
//!
//! Chooses which live entry to discard when the cache is full. The policy is
//! picked once at construction ([`EvictionPolicyKind`]) and never swapped,
//! since the bookkeeping of one variant means nothing to another.
//!
//! Policies only hold keys. They never own entries; the engine tells them
//! about insertions, accesses and removals and asks them for a victim.

mod fifo;
mod lfu;
mod list;
mod lru;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

pub use fifo::FifoPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;

/// Bookkeeping shared by every eviction strategy.
///
/// Accessing or removing a key the policy does not track is a no-op.
pub trait EvictionPolicy: Send + fmt::Debug {
    /// Called on every successful get or overwrite of a live entry.
    fn record_access(&mut self, key: &[u8]);

    /// Called when a key becomes live. A key that is already tracked is
    /// treated as an access.
    fn record_insertion(&mut self, key: Bytes);

    fn record_removal(&mut self, key: &[u8]);

    /// Next key to evict; `None` only when nothing is tracked.
    fn select_victim(&self) -> Option<Bytes>;

    fn contains(&self, key: &[u8]) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

// == Policy Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicyKind {
    Lru,
    Lfu,
    Fifo,
}

impl fmt::Display for EvictionPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicyKind::Lru => "lru",
            EvictionPolicyKind::Lfu => "lfu",
            EvictionPolicyKind::Fifo => "fifo",
        };
        f.write_str(name)
    }
}

impl FromStr for EvictionPolicyKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicyKind::Lru),
            "lfu" => Ok(EvictionPolicyKind::Lfu),
            "fifo" => Ok(EvictionPolicyKind::Fifo),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

// == Policy ==
/// The concrete policy a cache runs with.
#[derive(Debug)]
pub enum Policy {
    Lru(LruPolicy),
    Lfu(LfuPolicy),
    Fifo(FifoPolicy),
}

impl Policy {
    /// Builds an empty policy. The LFU settings are ignored by other kinds.
    pub fn new(
        kind: EvictionPolicyKind,
        lfu_max_frequency: u32,
        lfu_decay_after: Option<u64>,
    ) -> Self {
        match kind {
            EvictionPolicyKind::Lru => Policy::Lru(LruPolicy::new()),
            EvictionPolicyKind::Lfu => {
                Policy::Lfu(LfuPolicy::new(lfu_max_frequency, lfu_decay_after))
            }
            EvictionPolicyKind::Fifo => Policy::Fifo(FifoPolicy::new()),
        }
    }

    pub fn kind(&self) -> EvictionPolicyKind {
        match self {
            Policy::Lru(_) => EvictionPolicyKind::Lru,
            Policy::Lfu(_) => EvictionPolicyKind::Lfu,
            Policy::Fifo(_) => EvictionPolicyKind::Fifo,
        }
    }

    fn inner(&self) -> &dyn EvictionPolicy {
        match self {
            Policy::Lru(p) => p,
            Policy::Lfu(p) => p,
            Policy::Fifo(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn EvictionPolicy {
        match self {
            Policy::Lru(p) => p,
            Policy::Lfu(p) => p,
            Policy::Fifo(p) => p,
        }
    }
}

impl EvictionPolicy for Policy {
    fn record_access(&mut self, key: &[u8]) {
        self.inner_mut().record_access(key)
    }

    fn record_insertion(&mut self, key: Bytes) {
        self.inner_mut().record_insertion(key)
    }

    fn record_removal(&mut self, key: &[u8]) {
        self.inner_mut().record_removal(key)
    }

    fn select_victim(&self) -> Option<Bytes> {
        self.inner().select_victim()
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.inner().contains(key)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }
}

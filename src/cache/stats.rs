//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expirations. Counters are atomics so readers never contend with the
//! engine's locks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Collector ==
/// Live counters fed by the engine.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    consistency_errors: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        if count > 0 {
            self.expirations.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_consistency_error(&self) {
        self.consistency_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self, current_size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            consistency_errors: self.consistency_errors.load(Ordering::Relaxed),
            current_size,
        }
    }
}

// == Cache Stats ==
/// Snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Number of internal bookkeeping errors detected
    pub consistency_errors: u64,
    /// Current number of entries in the cache
    pub current_size: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsCollector::new().snapshot(0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = StatsCollector::new().snapshot(0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let collector = StatsCollector::new();
        collector.record_hit();
        collector.record_hit();
        collector.record_hit();
        assert_eq!(collector.snapshot(0).hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let collector = StatsCollector::new();
        collector.record_hit();
        collector.record_miss();
        assert_eq!(collector.snapshot(0).hit_rate(), 0.5);
    }

    #[test]
    fn test_counters() {
        let collector = StatsCollector::new();
        collector.record_eviction();
        collector.record_eviction();
        collector.record_expirations(3);
        collector.record_expirations(0);
        collector.record_consistency_error();

        let stats = collector.snapshot(42);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.consistency_errors, 1);
        assert_eq!(stats.current_size, 42);
    }

    #[test]
    fn test_stats_serialize() {
        let collector = StatsCollector::new();
        collector.record_hit();
        let json = serde_json::to_value(collector.snapshot(7)).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["current_size"], 7);
        assert_eq!(json["expirations"], 0);
    }
}

//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a simple model across random
//! operation sequences.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::{CacheStore, EvictionPolicyKind, ManualClock};
use crate::config::Config;
use crate::error::CacheError;

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;

fn store_with(capacity: usize, policy: EvictionPolicyKind) -> (CacheStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let config = Config {
        capacity,
        eviction_policy: policy,
        shard_count: 8,
        ..Config::default()
    };
    let store = CacheStore::with_clock(&config, clock.clone()).unwrap();
    (store, clock)
}

// == Strategies ==
/// Keys drawn from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicyKind> {
    prop_oneof![
        Just(EvictionPolicyKind::Lru),
        Just(EvictionPolicyKind::Lfu),
        Just(EvictionPolicyKind::Fifo),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Cas { key: String, value: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Cas { key, value }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Hit and miss counters match what callers observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (store, _) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    store.put(key, value, None).unwrap();
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Ok(_) => expected_hits += 1,
                    Err(_) => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
                CacheOp::Cas { key, value } => {
                    let _ = store.compare_and_swap(&key, 1, value);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.current_size, store.len());
        prop_assert_eq!(stats.evictions, 0);
    }

    /// Without eviction or expiry the store behaves like a map whose
    /// per-key versions only ever grow, even across delete and re-put.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let (store, _) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);
        let mut model: HashMap<String, (String, u64)> = HashMap::new();
        let mut highest: HashMap<String, u64> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    let version = store.put(key.clone(), value.clone(), None).unwrap();
                    match model.get(&key) {
                        Some((_, current)) => prop_assert_eq!(version, current + 1),
                        None => prop_assert!(version > highest.get(&key).copied().unwrap_or(0)),
                    }
                    highest.insert(key.clone(), version);
                    model.insert(key, (value, version));
                }
                CacheOp::Get { key } => {
                    let got = store.get(&key).ok();
                    let want = model.get(&key).map(|(v, _)| Bytes::from(v.clone()));
                    prop_assert_eq!(got, want);
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key), model.remove(&key).is_some());
                }
                CacheOp::Cas { key, value } => {
                    // guess the oldest version a key can have had, so stale
                    // guesses from earlier lifecycles get exercised
                    let result = store.compare_and_swap(&key, 1, value.clone());
                    match model.get_mut(&key) {
                        None => prop_assert_eq!(result, Err(CacheError::NotFound)),
                        Some(slot) if slot.1 == 1 => {
                            prop_assert_eq!(result, Ok(2));
                            *slot = (value, 2);
                            highest.insert(key, 2);
                        }
                        Some(slot) => prop_assert_eq!(
                            result,
                            Err(CacheError::VersionMismatch { expected: 1, actual: slot.1 })
                        ),
                    }
                }
            }
        }

        prop_assert_eq!(store.len(), model.len());
    }

    /// The store never holds more entries than its capacity, whatever the
    /// policy, and every put past capacity evicts exactly one entry.
    #[test]
    fn prop_capacity_enforcement(
        policy in policy_strategy(),
        capacity in 1usize..10,
        ops in prop::collection::vec(cache_op_strategy(), 1..120)
    ) {
        let (store, _) = store_with(capacity, policy);

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    store.put(key, value, None).unwrap();
                }
                CacheOp::Get { key } => {
                    let _ = store.get(&key);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
                CacheOp::Cas { key, value } => {
                    let _ = store.compare_and_swap(&key, 1, value);
                }
            }
            prop_assert!(store.len() <= capacity, "{} entries exceeds {}", store.len(), capacity);
        }
        prop_assert_eq!(store.stats().consistency_errors, 0);
    }

    /// Under LRU, filling past capacity evicts the least recently read key.
    #[test]
    fn prop_lru_eviction_order(
        count in 2usize..10,
        touched in 0usize..10,
    ) {
        let touched = touched % count;
        let (store, _) = store_with(count, EvictionPolicyKind::Lru);
        let keys: Vec<String> = (0..count).map(|i| format!("key{}", i)).collect();

        for key in &keys {
            store.put(key.clone(), "v", None).unwrap();
        }
        store.get(&keys[touched]).unwrap();
        store.put("fresh", "v", None).unwrap();

        let expected_victim = if touched == 0 { &keys[1] } else { &keys[0] };
        prop_assert!(!store.contains(expected_victim));
        prop_assert!(store.contains(&keys[touched]));
        prop_assert!(store.contains("fresh"));
        prop_assert_eq!(store.len(), count);
    }

    /// Successful CAS calls walk the version sequence 1, 2, 3, ... and a
    /// stale guess never changes the value.
    #[test]
    fn prop_cas_version_sequence(values in prop::collection::vec(value_strategy(), 1..20)) {
        let (store, _) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);
        store.put("k", "initial", None).unwrap();

        for (i, value) in values.iter().enumerate() {
            let current = i as u64 + 1;
            if current > 1 {
                let stale = store.compare_and_swap("k", current - 1, "stale");
                prop_assert_eq!(
                    stale,
                    Err(CacheError::VersionMismatch { expected: current - 1, actual: current })
                );
            }
            prop_assert_eq!(store.compare_and_swap("k", current, value.clone()), Ok(current + 1));
        }

        let entry = store.get_entry("k").unwrap();
        prop_assert_eq!(entry.version, values.len() as u64 + 1);
        prop_assert_eq!(entry.value, Bytes::from(values.last().unwrap().clone()));
    }

    /// An entry is readable strictly before its deadline and gone from then on.
    #[test]
    fn prop_ttl_boundary(ttl_ms in 1u64..10_000, before in 0u64..10_000) {
        let (store, clock) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);
        store.put("k", "v", Some(Duration::from_millis(ttl_ms))).unwrap();
        let start = store.now();

        clock.set(start + before.min(ttl_ms - 1));
        prop_assert!(store.get("k").is_ok());

        clock.set(start + ttl_ms);
        prop_assert_eq!(store.get("k"), Err(CacheError::NotFound));
        prop_assert_eq!(store.stats().expirations, 1);
    }

    /// A bounded sweep never removes more than its bound, and repeated sweeps
    /// reclaim exactly the expired entries.
    #[test]
    fn prop_bounded_sweep(
        ttls in prop::collection::vec(prop::option::of(1u64..100), 1..60),
        bound in 1usize..20,
    ) {
        let (store, clock) = store_with(TEST_CAPACITY, EvictionPolicyKind::Fifo);
        for (i, ttl) in ttls.iter().enumerate() {
            store
                .put(format!("k{}", i), "v", ttl.map(Duration::from_millis))
                .unwrap();
        }
        let now = clock.advance(Duration::from_millis(50));
        let due = ttls.iter().filter(|t| matches!(t, Some(ms) if *ms <= 50)).count();

        let mut swept = 0;
        loop {
            let removed = store.sweep_expired_bounded(now, bound);
            prop_assert!(removed <= bound);
            if removed == 0 {
                break;
            }
            swept += removed;
        }
        prop_assert_eq!(swept, due);
        prop_assert_eq!(store.len(), ttls.len() - due);
    }
}

// == Concurrency ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Threads hammering overlapping keys never break the capacity bound, and
    /// every read returns a complete value some writer stored.
    #[test]
    fn prop_concurrent_operation_correctness(
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 10..60)
    ) {
        let (store, _) = store_with(8, policy);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                let ops = ops.clone();
                std::thread::spawn(move || {
                    for op in ops {
                        match op {
                            CacheOp::Put { key, value } => {
                                store.put(key, format!("{}:{}", t, value), None).unwrap();
                            }
                            CacheOp::Get { key } => {
                                if let Ok(value) = store.get(&key) {
                                    let text = std::str::from_utf8(&value).unwrap();
                                    assert!(text.split_once(':').is_some(), "torn value {:?}", text);
                                }
                            }
                            CacheOp::Delete { key } => {
                                store.delete(&key);
                            }
                            CacheOp::Cas { key, value } => {
                                if let Ok(entry) = store.get_entry(&key) {
                                    let _ = store.compare_and_swap(
                                        &key,
                                        entry.version,
                                        format!("{}:{}", t, value),
                                    );
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            prop_assert!(handle.join().is_ok(), "worker thread panicked");
        }

        let stats = store.stats();
        prop_assert!(stats.current_size <= 8);
        prop_assert_eq!(stats.consistency_errors, 0);
        let hit_rate = stats.hit_rate();
        prop_assert!((0.0..=1.0).contains(&hit_rate), "hit rate {}", hit_rate);
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE};

    #[test]
    fn test_key_length_validation() {
        let (store, _) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);

        let at_limit = "x".repeat(DEFAULT_MAX_KEY_SIZE);
        assert!(store.put(at_limit, "value", None).is_ok());

        let long_key = "x".repeat(DEFAULT_MAX_KEY_SIZE + 1);
        assert!(matches!(
            store.put(long_key, "value", None),
            Err(CacheError::CapacityViolation(_))
        ));
    }

    #[test]
    fn test_value_size_validation() {
        let (store, _) = store_with(TEST_CAPACITY, EvictionPolicyKind::Lru);
        let large_value = vec![b'x'; DEFAULT_MAX_VALUE_SIZE + 1];

        assert!(matches!(
            store.put("key", large_value, None),
            Err(CacheError::CapacityViolation(_))
        ));
        assert!(store.is_empty());
    }
}

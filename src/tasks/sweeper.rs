//! Expiry Sweeper Task
//!
//! Background task that periodically reclaims expired cache entries. Reads
//! already treat expired entries as absent, so the sweeper only frees memory
//! earlier than lazy expiry would.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Each sweep removes at most `batch` entries at a time. When a batch comes
/// back full the task yields and sweeps again instead of waiting for the next
/// tick, so a large backlog drains without holding shard locks for long.
///
/// The returned handle is owned by the caller; abort it on shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(CacheStore::from_config(&config)?);
/// let sweeper = spawn_sweeper_task(store.clone(), Duration::from_secs(1), 1024);
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task(
    store: Arc<CacheStore>,
    interval: Duration,
    batch: usize,
) -> JoinHandle<()> {
    let batch = if batch == 0 {
        warn!("sweep batch size of 0 requested, using 1");
        1
    } else {
        batch
    };

    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            batch, "starting expiry sweeper"
        );

        loop {
            tokio::time::sleep(interval).await;

            let mut total = 0;
            loop {
                let removed = store.sweep_expired_bounded(store.now(), batch);
                total += removed;
                if removed < batch {
                    break;
                }
                tokio::task::yield_now().await;
            }

            if total > 0 {
                info!(removed = total, "expiry sweep reclaimed entries");
            } else {
                debug!("expiry sweep found nothing to reclaim");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EvictionPolicyKind, ManualClock};
    use crate::config::Config;

    fn test_store() -> (Arc<CacheStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(5_000));
        let config = Config {
            capacity: 100,
            eviction_policy: EvictionPolicyKind::Lru,
            ..Config::default()
        };
        let store = CacheStore::with_clock(&config, clock.clone()).unwrap();
        (Arc::new(store), clock)
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let (store, clock) = test_store();
        for i in 0..10 {
            store
                .put(format!("expire_soon{}", i), "value", Some(Duration::from_millis(5)))
                .unwrap();
        }
        clock.advance(Duration::from_millis(5));

        // batch smaller than the backlog forces several passes per tick
        let handle = spawn_sweeper_task(store.clone(), Duration::from_millis(10), 3);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // len counts physically present entries, so only the sweeper can empty it
        assert!(store.is_empty(), "expired entries should have been swept");
        assert_eq!(store.stats().expirations, 10);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_preserves_live_entries() {
        let (store, clock) = test_store();
        store
            .put("long_lived", "value", Some(Duration::from_secs(3600)))
            .unwrap();
        store.put("forever", "value", None).unwrap();
        clock.advance(Duration::from_secs(60));

        let handle = spawn_sweeper_task(store.clone(), Duration::from_millis(10), 16);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 2);
        assert!(store.get("long_lived").is_ok());

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let (store, _) = test_store();

        let handle = spawn_sweeper_task(store, Duration::from_millis(10), 0);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}

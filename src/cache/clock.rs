//! Clock Module
//!
//! Time source for expiry decisions. Expiry is a pure function of an entry's
//! stored deadline and the current time, so every access point asks a
//! [`Clock`] rather than reading global timer state.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> u64;
}

// == System Clock ==
/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

// == Manual Clock ==
/// Clock that only moves when told to. Used to drive expiry in virtual time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Moves the clock forward, returning the new time.
    pub fn advance(&self, by: Duration) -> u64 {
        let delta = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Converts a TTL into an absolute deadline.
///
/// `None` and a zero duration both mean "never expires". Durations shorter
/// than a millisecond round up to one so a non-zero TTL always expires.
pub fn deadline_after(now_ms: u64, ttl: Option<Duration>) -> Option<u64> {
    let ttl = ttl.filter(|d| !d.is_zero())?;
    let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
    Some(now_ms.saturating_add(ms))
}

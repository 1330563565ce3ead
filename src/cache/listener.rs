//! Removal listeners
//!
//! Callbacks told about every entry that leaves the cache and why. They run
//! after the engine has released its locks, so a listener may call back into
//! the cache.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalCause {
    /// Removed by an explicit delete
    Deleted,
    /// Old value overwritten by put or compare-and-swap
    Replaced,
    /// TTL elapsed
    Expired,
    /// Discarded to make room
    Evicted,
    /// Dropped by `clear`
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalNotification {
    pub key: Bytes,
    pub value: Bytes,
    pub cause: RemovalCause,
}

impl RemovalNotification {
    pub fn new(key: Bytes, value: Bytes, cause: RemovalCause) -> Self {
        Self { key, value, cause }
    }
}

pub type RemovalListener = Arc<dyn Fn(&RemovalNotification) + Send + Sync>;

/// Registered listeners, invoked in registration order.
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    inner: Vec<RemovalListener>,
}

impl Listeners {
    pub fn push(&mut self, listener: RemovalListener) {
        self.inner.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn notify(&self, notifications: &[RemovalNotification]) {
        for notification in notifications {
            for listener in &self.inner {
                listener(notification);
            }
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.inner.len())
            .finish()
    }
}

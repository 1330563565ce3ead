//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key absent or logically expired at the time of access
    #[error("Key not found")]
    NotFound,

    /// Compare-and-swap precondition failed
    #[error("Version mismatch: expected {expected}, found {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// Key or value outside the configured size limits
    #[error("Capacity violation: {0}")]
    CapacityViolation(String),

    /// Bookkeeping between the entry table and eviction policy disagrees
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Returns true for outcomes that are part of normal operation
    /// (a miss or a lost compare-and-swap race).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound | CacheError::VersionMismatch { .. }
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

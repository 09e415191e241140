//! Shared counter stores for the distributed limiter.
//!
//! A store only has to offer one compound operation, described by
//! [`CounterStore::increment_window`]. Every adapter must apply it atomically
//! with respect to other callers touching the same key.

mod memory;
mod redis;

pub use self::memory::InMemoryCounterStore;
pub use self::redis::{RedisCounterStore, FIXED_WINDOW_SCRIPT, SCRIPT_VERSION};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while talking to a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis client reported a failure
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The store did not answer in time
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached for any other reason
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A key-value store holding one integer counter per window key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically count one hit against `key`.
    ///
    /// Increments the counter at `key`. When the incremented value is 1 the
    /// entry is given a time-to-live of `ttl`. Returns whether the incremented
    /// value is still within `limit`.
    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

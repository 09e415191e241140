//! Rate limiter trait for abstracting local and distributed implementations.

use std::time::Duration;

use async_trait::async_trait;

use super::store::StoreError;

/// Longest window either limiter accepts: 100 years of 365 days.
///
/// Window ends and counter expiries are computed as timestamps, and a Redis
/// `EXPIRE` is kept in milliseconds internally, so both must stay representable.
pub const MAX_WINDOW: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Trait for rate limiter implementations.
///
/// Both the in-process `FixedWindowLimiter` and the store-backed
/// `DistributedFixedWindowLimiter` implement this, so the HTTP boundary can
/// work with either.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one request for `key` and decide whether it is admitted.
    ///
    /// `Ok(false)` is an ordinary denial. An `Err` is only returned when the
    /// backing store could not be consulted. Callers are expected to reject
    /// empty keys before getting here.
    async fn allow(&self, key: &str) -> Result<bool, StoreError>;
}


//! Distributed rate limiter backed by a shared counter store.
//!
//! Every process pointing at the same store and namespace shares one counter
//! per caller and window. Windows are aligned to multiples of the window size
//! since the Unix epoch, so all processes agree on where a window starts
//! without talking to each other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::failure::FailureMode;
use super::key::{StorageKey, DEFAULT_NAMESPACE};
use super::limiter::{RateLimiter, MAX_WINDOW};
use super::store::{CounterStore, StoreError};
use crate::error::{RatekeeperError, Result};

/// Fixed-window limiter that delegates counting to a [`CounterStore`].
pub struct DistributedFixedWindowLimiter<S: CounterStore + ?Sized> {
    /// The shared counter store
    store: Arc<S>,
    /// Prefix separating this limiter's keys from others in the same store
    namespace: String,
    /// Maximum requests admitted per window
    limit: u64,
    /// Window length in whole seconds
    window_secs: i64,
    clock: Arc<dyn Clock>,
    failure_mode: FailureMode,
}

impl<S: CounterStore + ?Sized> DistributedFixedWindowLimiter<S> {
    /// Create a new distributed limiter.
    ///
    /// An empty `namespace` falls back to `"fw"`. The window is counted in
    /// whole seconds; anything below one second is rejected and fractional
    /// seconds are dropped. Windows longer than [`MAX_WINDOW`] are rejected.
    pub fn new(store: Arc<S>, namespace: &str, limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(RatekeeperError::InvalidConfig(
                "rate limit must be greater than zero".to_string(),
            ));
        }
        if window.as_secs() == 0 {
            return Err(RatekeeperError::InvalidConfig(format!(
                "window size must be at least one second, got {:?}",
                window
            )));
        }
        if window > MAX_WINDOW {
            return Err(RatekeeperError::InvalidConfig(format!(
                "window size {:?} exceeds the maximum of {:?}",
                window, MAX_WINDOW
            )));
        }
        let window_secs = i64::try_from(window.as_secs()).map_err(|_| {
            RatekeeperError::InvalidConfig(format!("window size {:?} is out of range", window))
        })?;

        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            namespace.to_string()
        };

        Ok(Self {
            store,
            namespace,
            limit,
            window_secs,
            clock: Arc::new(SystemClock),
            failure_mode: FailureMode::default(),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set how store failures are handled.
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    /// The namespace in use.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Maximum requests admitted per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The configured failure mode.
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Time-to-live given to a fresh counter: the window plus one second.
    pub fn ttl(&self) -> Duration {
        // window_secs is positive, checked at construction
        Duration::from_secs(self.window_secs as u64 + 1)
    }

    /// The storage key `key` maps to at the current time.
    pub fn storage_key(&self, key: &str) -> StorageKey {
        StorageKey::derive(&self.namespace, key, self.clock.now(), self.window_secs)
    }
}

#[async_trait]
impl<S: CounterStore + ?Sized> RateLimiter for DistributedFixedWindowLimiter<S> {
    async fn allow(&self, key: &str) -> std::result::Result<bool, StoreError> {
        let storage_key = self.storage_key(key).to_string();

        trace!(
            key = %key,
            storage_key = %storage_key,
            limit = self.limit,
            "Checking distributed rate limit"
        );

        match self
            .store
            .increment_window(&storage_key, self.limit, self.ttl())
            .await
        {
            Ok(allowed) => {
                if !allowed {
                    debug!(
                        key = %key,
                        storage_key = %storage_key,
                        limit = self.limit,
                        "Distributed rate limit exceeded"
                    );
                }
                Ok(allowed)
            }
            Err(err) => {
                warn!(
                    key = %key,
                    storage_key = %storage_key,
                    failure_mode = ?self.failure_mode,
                    error = %err,
                    "Counter store unavailable"
                );
                self.failure_mode.resolve(err)
            }
        }
    }
}

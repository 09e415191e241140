//! In-process fixed-window rate limiter.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{RateLimiter, MAX_WINDOW};
use super::store::StoreError;
use crate::error::{RatekeeperError, Result};

/// Counting state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// When this key's current window was opened
    pub window_start: DateTime<Utc>,
    /// Requests admitted in the current window
    pub count: u64,
}

impl WindowState {
    fn open(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 1,
        }
    }
}

/// Fixed-window limiter that keeps every key's state in memory.
///
/// Each key's window is anchored to the request that opened it rather than to
/// an epoch boundary. The whole decision for any key runs under one lock, so
/// a key can never be admitted more than `limit` times per window no matter
/// how calls interleave.
pub struct FixedWindowLimiter {
    /// Window state indexed by key
    states: Mutex<HashMap<String, WindowState>>,
    /// Maximum requests admitted per window
    limit: u64,
    /// Window length
    window: Duration,
    /// Window length in chrono form, for arithmetic against the clock
    window_delta: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    /// Create a limiter that reads the system clock.
    pub fn new(limit: u64, window: Duration) -> Result<Self> {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    /// Create a limiter with an injected time source.
    pub fn with_clock(limit: u64, window: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        if limit == 0 {
            return Err(RatekeeperError::InvalidConfig(
                "rate limit must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(RatekeeperError::InvalidConfig(
                "window size must be greater than zero".to_string(),
            ));
        }
        if window > MAX_WINDOW {
            return Err(RatekeeperError::InvalidConfig(format!(
                "window size {:?} exceeds the maximum of {:?}",
                window, MAX_WINDOW
            )));
        }
        let window_delta = TimeDelta::from_std(window).map_err(|_| {
            RatekeeperError::InvalidConfig(format!("window size {:?} is out of range", window))
        })?;

        Ok(Self {
            states: Mutex::new(HashMap::new()),
            limit,
            window,
            window_delta,
            clock,
        })
    }

    /// Maximum requests admitted per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn check(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut states = self.states.lock();

        if let Some(state) = states.get_mut(key) {
            if self.window_ended(state, now) {
                trace!(key = %key, previous_count = state.count, "Window expired, resetting");
                *state = WindowState::open(now);
                return true;
            }

            if state.count < self.limit {
                state.count += 1;
                trace!(key = %key, count = state.count, limit = self.limit, "Request admitted");
                return true;
            }

            debug!(key = %key, limit = self.limit, "Rate limit exceeded");
            return false;
        }

        debug!(key = %key, limit = self.limit, "Opening window for new key");
        states.insert(key.to_owned(), WindowState::open(now));
        true
    }

    // A window whose end is past the last representable instant never ends.
    fn window_ended(&self, state: &WindowState, now: DateTime<Utc>) -> bool {
        state
            .window_start
            .checked_add_signed(self.window_delta)
            .is_some_and(|end| now >= end)
    }

    /// Snapshot of the state held for `key`, if any.
    pub fn window_state(&self, key: &str) -> Option<WindowState> {
        self.states.lock().get(key).copied()
    }

    /// Number of keys currently tracked.
    pub fn entry_count(&self) -> usize {
        self.states.lock().len()
    }

    /// Drop all state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.states.lock().clear();
    }

    /// Remove every key whose window has already run out.
    ///
    /// An expired entry would be reset by its next request anyway, so this
    /// only reclaims memory and never changes a decision. Returns the number
    /// of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|_, state| !self.window_ended(state, now));
        before - states.len()
    }

    /// Run `evict_idle` every `every` on the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the limiter is
    /// dropped. `every` must be non-zero.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.evict_idle();
                if evicted > 0 {
                    debug!(
                        evicted = evicted,
                        remaining = limiter.entry_count(),
                        "Evicted idle rate limit windows"
                    );
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self, key: &str) -> std::result::Result<bool, StoreError> {
        Ok(self.check(key))
    }
}

//! Counter store kept in process memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use super::{CounterStore, StoreError};
use crate::ratelimit::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Option<DateTime<Utc>>,
}

impl Counter {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// An in-memory implementation of the counter store contract.
///
/// Expiry is judged against an injected clock, so tests can move across TTLs
/// without sleeping. Every new key prunes the counters that have run out, so
/// the map holds roughly one window's worth of keys.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    /// Create a store that reads the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store with an injected time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Current value of the counter at `key`, if it is live.
    pub fn value(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        self.counters
            .lock()
            .get(key)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.value)
    }

    /// Remaining time-to-live of the counter at `key`.
    ///
    /// Returns `None` if the key is absent, expired, or has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let counters = self.counters.lock();
        let counter = counters.get(key).filter(|c| !c.is_expired(now))?;
        (counter.expires_at? - now).to_std().ok()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.counters
            .lock()
            .values()
            .filter(|c| !c.is_expired(now))
            .count()
    }

    /// Whether the store holds no live counters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| StoreError::Unavailable(format!("ttl {:?} is out of range", ttl)))?;
        let mut counters = self.counters.lock();

        let live = counters.get(key).is_some_and(|c| !c.is_expired(now));
        if !live {
            counters.retain(|_, c| !c.is_expired(now));
        }

        let counter = counters.entry(key.to_owned()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        counter.value += 1;
        if counter.value == 1 {
            counter.expires_at = Some(expires_at);
        }

        Ok(counter.value <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;
    use chrono::TimeZone;

    fn store_at() -> (InMemoryCounterStore, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        (InMemoryCounterStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_first_increment_sets_ttl() {
        let (store, _clock) = store_at();

        assert!(store.increment_window("k", 3, Duration::from_secs(11)).await.unwrap());
        assert_eq!(store.value("k"), Some(1));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(11)));
    }

    #[tokio::test]
    async fn test_later_increments_keep_original_ttl() {
        let (store, clock) = store_at();

        store.increment_window("k", 3, Duration::from_secs(11)).await.unwrap();
        clock.advance(TimeDelta::seconds(4));
        store.increment_window("k", 3, Duration::from_secs(11)).await.unwrap();

        assert_eq!(store.value("k"), Some(2));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_over_limit_still_counts() {
        let (store, _clock) = store_at();

        assert!(store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap());
        assert!(!store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap());
        assert!(!store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap());

        assert_eq!(store.value("k"), Some(3));
    }

    #[tokio::test]
    async fn test_expired_counter_starts_over() {
        let (store, clock) = store_at();

        store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap();
        store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap();

        clock.advance(TimeDelta::seconds(5));
        assert_eq!(store.value("k"), None);
        assert!(store.is_empty());

        assert!(store.increment_window("k", 1, Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.value("k"), Some(1));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_new_keys_prune_expired_counters() {
        let (store, clock) = store_at();

        for window in 0..1000 {
            let key = format!("rl:fw:abc:{}", window);
            store.increment_window(&key, 5, Duration::from_secs(2)).await.unwrap();
            clock.advance(TimeDelta::seconds(1));
        }

        assert!(store.counters.lock().len() <= 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_live_counters_survive_pruning() {
        let (store, clock) = store_at();

        store.increment_window("short", 5, Duration::from_secs(1)).await.unwrap();
        store.increment_window("long", 5, Duration::from_secs(60)).await.unwrap();
        clock.advance(TimeDelta::seconds(2));
        store.increment_window("other", 5, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.counters.lock().len(), 2);
        assert_eq!(store.value("long"), Some(1));
        assert_eq!(store.value("short"), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let (store, _clock) = store_at();

        let result = store
            .increment_window("k", 5, Duration::from_secs(10_000_000_000_000))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        let result = store.increment_window("k", 5, Duration::MAX).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.counters.lock().is_empty());
    }
}

//! Storage key generation for the shared counter store.

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

/// Leading segment of every storage key.
pub const KEY_PREFIX: &str = "rl";

/// Namespace used when a limiter is configured without one.
pub const DEFAULT_NAMESPACE: &str = "fw";

/// The shared-store key holding one caller's counter for one window.
///
/// Rendered as `rl:<namespace>:<sha1(key) in hex>:<window start>`. Other
/// processes sharing the store derive the same string, so the layout must
/// not change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    /// The limiter's namespace
    pub namespace: String,
    /// Lowercase hex SHA-1 of the caller's key
    pub key_hash: String,
    /// Unix seconds at which the window opened, aligned to the window size
    pub window_start: i64,
}

impl StorageKey {
    /// Build the storage key for `key` in the window containing `now`.
    pub fn derive(namespace: &str, key: &str, now: DateTime<Utc>, window_secs: i64) -> Self {
        Self {
            namespace: namespace.to_string(),
            key_hash: hash_key(key),
            window_start: aligned_window_start(now.timestamp(), window_secs),
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            KEY_PREFIX, self.namespace, self.key_hash, self.window_start
        )
    }
}

/// Floor `now_unix` to a multiple of `window_secs`.
pub fn aligned_window_start(now_unix: i64, window_secs: i64) -> i64 {
    now_unix.div_euclid(window_secs) * window_secs
}

fn hash_key(key: &str) -> String {
    let digest = Sha1::digest(key.as_bytes());
    hex::encode(digest)
}

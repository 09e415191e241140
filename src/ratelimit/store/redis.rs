//! Redis-backed counter store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use tracing::{debug, info};

use super::{CounterStore, StoreError};
use crate::config::RedisConfig;

/// Revision of the counter contract implemented by [`FIXED_WINDOW_SCRIPT`].
///
/// Version 1: `INCR KEYS[1]`; if the result is 1, `EXPIRE KEYS[1] ARGV[2]`;
/// reply 1 when the result is at most `ARGV[1]`, else 0.
pub const SCRIPT_VERSION: u32 = 1;

/// Server-side script that counts one hit and reports whether it fits.
///
/// `KEYS[1]` is the window key, `ARGV[1]` the limit and `ARGV[2]` the TTL in
/// seconds. Redis runs scripts atomically, so the increment, the first-hit
/// expiry and the comparison cannot interleave with another caller.
pub const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call("INCR", KEYS[1])
if current == 1 then
  redis.call("EXPIRE", KEYS[1], tonumber(ARGV[2]))
end

local limit = tonumber(ARGV[1])
if current <= limit then
  return 1
end
return 0
"#;

/// Counter store talking to a Redis server through a managed connection.
///
/// The connection manager reconnects on its own after failures; calls made
/// while Redis is unreachable fail with [`StoreError::Redis`].
pub struct RedisCounterStore {
    connection: ConnectionManager,
    script: Script,
    /// Per-call deadline
    timeout: Option<Duration>,
}

impl RedisCounterStore {
    /// Connect using the given configuration.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())?;
        info!(addr = %client.get_connection_info().addr, "Connecting to Redis");

        let connection = ConnectionManager::new(client).await?;
        let store = Self::from_connection(connection).with_timeout(config.operation_timeout());

        info!(
            script_version = SCRIPT_VERSION,
            timeout = ?store.timeout,
            "Redis counter store ready"
        );
        Ok(store)
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            timeout: None,
        }
    }

    /// Bound every store call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Round-trip a `PING` to check connectivity.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: String = self
            .with_deadline(async { redis::cmd("PING").query_async(&mut connection).await })
            .await?;
        debug!("Redis ping succeeded");
        Ok(())
    }

    async fn with_deadline<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| StoreError::Timeout(limit))?
                .map_err(StoreError::from),
            None => op.await.map_err(StoreError::from),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl_secs = ttl.as_secs();
        let mut connection = self.connection.clone();

        // EVALSHA first, falling back to EVAL when the script is not cached.
        let admitted: i64 = self
            .with_deadline(async {
                self.script
                    .key(key)
                    .arg(limit)
                    .arg(ttl_secs)
                    .invoke_async(&mut connection)
                    .await
            })
            .await?;

        Ok(admitted == 1)
    }
}

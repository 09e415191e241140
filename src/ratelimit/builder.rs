//! Assemble a limiter from configuration.

use std::sync::Arc;

use tracing::info;

use super::distributed::DistributedFixedWindowLimiter;
use super::limiter::RateLimiter;
use super::local::FixedWindowLimiter;
use super::store::RedisCounterStore;
use crate::config::{Backend, LimiterConfig};
use crate::error::{RatekeeperError, Result};

/// Build the limiter selected by `config`.
///
/// Invalid settings are rejected before any connection is attempted. For the
/// local backend with a sweep interval, the idle sweeper is spawned on the
/// current runtime.
pub async fn build_limiter(config: &LimiterConfig) -> Result<Arc<dyn RateLimiter>> {
    config.validate()?;

    match config.backend {
        Backend::Local => {
            let limiter = Arc::new(FixedWindowLimiter::new(config.limit, config.window())?);
            if let Some(every) = config.idle_sweep_interval() {
                limiter.spawn_idle_sweeper(every);
            }

            info!(
                limit = config.limit,
                window_secs = config.window_secs,
                idle_sweep_interval_secs = ?config.idle_sweep_interval_secs,
                "Local rate limiter initialized"
            );
            Ok(limiter)
        }
        Backend::Redis => {
            let redis = config.redis.as_ref().ok_or_else(|| {
                RatekeeperError::InvalidConfig(
                    "the redis backend requires a limiter.redis section".to_string(),
                )
            })?;
            let store = Arc::new(RedisCounterStore::connect(redis).await?);
            let limiter =
                DistributedFixedWindowLimiter::new(store, &config.namespace, config.limit, config.window())?
                    .with_failure_mode(config.failure_mode);

            info!(
                namespace = %limiter.namespace(),
                limit = config.limit,
                window_secs = config.window_secs,
                failure_mode = ?config.failure_mode,
                "Distributed rate limiter initialized"
            );
            Ok(Arc::new(limiter))
        }
    }
}

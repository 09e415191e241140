//! Configuration management for Ratekeeper.
//!
//! Settings are layered: built-in defaults, then an optional YAML/TOML/JSON
//! file, then `RATEKEEPER__<SECTION>__<FIELD>` environment variables.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{FailureMode, MAX_WINDOW};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RATEKEEPER";

/// Main configuration for the Ratekeeper service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which limiter implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process counting, per-key floating windows
    #[default]
    Local,
    /// Shared counting in Redis, epoch-aligned windows
    Redis,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Requests allowed per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Key namespace in the shared store (Redis backend only)
    #[serde(default)]
    pub namespace: String,

    /// Store failure handling (Redis backend only)
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// How often to reclaim expired windows (local backend only)
    #[serde(default)]
    pub idle_sweep_interval_secs: Option<u64>,

    /// Redis connection settings, required for the Redis backend
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            limit: default_limit(),
            window_secs: default_window_secs(),
            namespace: String::new(),
            failure_mode: FailureMode::default(),
            idle_sweep_interval_secs: None,
            redis: None,
        }
    }
}

fn default_limit() -> u64 {
    5
}

fn default_window_secs() -> u64 {
    60
}

impl LimiterConfig {
    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Sweep interval for idle local windows, if enabled.
    pub fn idle_sweep_interval(&self) -> Option<Duration> {
        self.idle_sweep_interval_secs.map(Duration::from_secs)
    }

    /// Reject settings no limiter can run with.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(RatekeeperError::InvalidConfig(
                "limiter.limit must be greater than zero".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(RatekeeperError::InvalidConfig(
                "limiter.window_secs must be greater than zero".to_string(),
            ));
        }
        if self.window_secs > MAX_WINDOW.as_secs() {
            return Err(RatekeeperError::InvalidConfig(format!(
                "limiter.window_secs must be at most {}",
                MAX_WINDOW.as_secs()
            )));
        }
        if self.idle_sweep_interval_secs == Some(0) {
            return Err(RatekeeperError::InvalidConfig(
                "limiter.idle_sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.backend == Backend::Redis && self.redis.is_none() {
            return Err(RatekeeperError::InvalidConfig(
                "the redis backend requires a limiter.redis section".to_string(),
            ));
        }
        Ok(())
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,

    /// Deadline for a single store call in milliseconds
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl RedisConfig {
    /// Per-call deadline, if configured.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

impl RatekeeperConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    /// Load configuration from a YAML string, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn load_with(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder.add_source(environment).build()?;
        Ok(config.try_deserialize()?)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }
}

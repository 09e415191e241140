//! Rate limiting logic and state management.

mod builder;
mod clock;
mod distributed;
mod failure;
mod key;
mod limiter;
mod local;
pub mod store;

pub use builder::build_limiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use distributed::DistributedFixedWindowLimiter;
pub use failure::FailureMode;
pub use key::{aligned_window_start, StorageKey, DEFAULT_NAMESPACE, KEY_PREFIX};
pub use limiter::{RateLimiter, MAX_WINDOW};
pub use local::{FixedWindowLimiter, WindowState};
pub use store::{CounterStore, InMemoryCounterStore, RedisCounterStore, StoreError};

//! Fixed-window rate limiting over a shared atomic counter store.

mod backend;
mod clock;
mod key;
mod limiter;
mod memory;
mod redis_store;
mod store;
mod window;

pub use backend::RateLimiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{CounterKey, KEY_PREFIX};
pub use limiter::{decide, FixedWindowRateLimiter, RateLimitResult, RateLimitStatus};
pub use memory::InMemoryCounterStore;
pub use redis_store::RedisCounterStore;
pub use store::{CounterBackend, CounterStore, FailOpen, DEFAULT_STORE_TIMEOUT, FAIL_OPEN_COUNT};
pub use window::{reset_time, window_start, RateLimitConfig, TimeUnit, TimeWindow};

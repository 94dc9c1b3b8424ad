//! Atomic counter store contract and the fail-open adapter.
//!
//! A [`CounterBackend`] talks to a concrete store and may fail. The limiter only ever sees a
//! [`CounterStore`], which cannot fail: [`FailOpen`] bridges the two by bounding each call with
//! a timeout and substituting a first-touch count when the backend errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{trace, warn};

use crate::error::{Result, TollgateError};

/// Count reported when the backend is unavailable: the request is treated as the first one
/// in a fresh window.
pub const FAIL_OPEN_COUNT: u64 = 1;

/// Default deadline for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(100);

/// Counter store as consumed by the limiter.
///
/// `increment` atomically adds one to the counter at `key` (an absent key counts from zero)
/// and returns the new value. When that value is 1 the key's time-to-live is set to
/// `ttl_secs` in the same atomic step; otherwise the existing time-to-live is left alone.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str, ttl_secs: u64) -> u64;
}

#[async_trait]
impl<T: CounterStore + ?Sized> CounterStore for Arc<T> {
    async fn increment(&self, key: &str, ttl_secs: u64) -> u64 {
        (**self).increment(key, ttl_secs).await
    }
}

/// A concrete store offering the atomic increment-and-conditionally-expire operation.
///
/// Implementations must perform the increment and the first-touch expiry as one indivisible
/// operation at the store. A client-side read followed by a write does not qualify.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<u64>;
}

#[async_trait]
impl<T: CounterBackend + ?Sized> CounterBackend for Arc<T> {
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        (**self).increment(key, ttl_secs).await
    }
}

/// Adapter that never lets a backend failure reach the limiter.
///
/// Errors and timeouts are logged and reported as [`FAIL_OPEN_COUNT`]. The backend call is
/// made once; there are no retries.
#[derive(Debug, Clone)]
pub struct FailOpen<B> {
    backend: B,
    timeout: Duration,
}

impl<B: CounterBackend> FailOpen<B> {
    /// Wrap a backend with the default timeout.
    pub fn new(backend: B) -> Self {
        Self::with_timeout(backend, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_timeout(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<B: CounterBackend> CounterStore for FailOpen<B> {
    async fn increment(&self, key: &str, ttl_secs: u64) -> u64 {
        let outcome = tokio::time::timeout(self.timeout, self.backend.increment(key, ttl_secs))
            .await
            .unwrap_or(Err(TollgateError::StoreTimeout(self.timeout)));

        match outcome {
            Ok(count) => {
                trace!(key = %key, count = count, "Counter incremented");
                count
            }
            Err(err) => {
                warn!(
                    key = %key,
                    error = %err,
                    "Counter store unavailable, failing open"
                );
                FAIL_OPEN_COUNT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::InMemoryCounterStore;

    struct FailingBackend;

    #[async_trait]
    impl CounterBackend for FailingBackend {
        async fn increment(&self, _key: &str, _ttl_secs: u64) -> Result<u64> {
            Err(TollgateError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    struct StalledBackend;

    #[async_trait]
    impl CounterBackend for StalledBackend {
        async fn increment(&self, _key: &str, _ttl_secs: u64) -> Result<u64> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(42)
        }
    }

    #[tokio::test]
    async fn test_passes_through_backend_count() {
        let store = FailOpen::new(InMemoryCounterStore::new());

        assert_eq!(store.increment("rate_limit:a:0", 60).await, 1);
        assert_eq!(store.increment("rate_limit:a:0", 60).await, 2);
        assert_eq!(store.increment("rate_limit:b:0", 60).await, 1);
    }

    #[tokio::test]
    async fn test_backend_error_fails_open() {
        let store = FailOpen::new(FailingBackend);

        for _ in 0..3 {
            assert_eq!(store.increment("rate_limit:a:0", 60).await, FAIL_OPEN_COUNT);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_timeout_fails_open() {
        let store = FailOpen::with_timeout(StalledBackend, Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        assert_eq!(store.increment("rate_limit:a:0", 60).await, FAIL_OPEN_COUNT);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_shared_backend_through_arc() {
        let backend = Arc::new(InMemoryCounterStore::new());
        let store = FailOpen::new(backend.clone());

        store.increment("rate_limit:a:0", 60).await;
        store.increment("rate_limit:a:0", 60).await;

        assert_eq!(backend.len(), 1);
        assert_eq!(store.timeout(), DEFAULT_STORE_TIMEOUT);
    }
}

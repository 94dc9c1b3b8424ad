//! Rate limiter trait used by the transport layer.

use async_trait::async_trait;

use super::limiter::RateLimitResult;
use crate::error::Result;

/// Trait for rate limiter implementations.
///
/// Lets the HTTP layer hold any limiter as a trait object, independent of the counter store
/// and clock it was built with.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request against `identifier` and return the decision.
    async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitResult>;
}

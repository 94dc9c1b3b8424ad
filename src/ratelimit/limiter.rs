//! Fixed-window rate limiter.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use super::clock::{Clock, SystemClock};
use super::key::CounterKey;
use super::store::CounterStore;
use super::window::{self, RateLimitConfig};
use crate::error::{Result, TollgateError};

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStatus {
    Allowed,
    Rejected,
}

/// Decision and quota metadata for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub status: RateLimitStatus,
    /// Requests allowed per window
    pub limit: u64,
    /// Requests left in the current window, never negative
    pub remaining: u64,
    /// Unix time at which the current window ends
    pub reset_time: u64,
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        self.status == RateLimitStatus::Allowed
    }
}

/// Turn the post-increment count into a decision.
///
/// A count equal to the limit is still allowed; only exceeding it rejects.
pub fn decide(limit: u64, count: u64, reset_time: u64) -> RateLimitResult {
    let status = if count <= limit {
        RateLimitStatus::Allowed
    } else {
        RateLimitStatus::Rejected
    };

    RateLimitResult {
        status,
        limit,
        remaining: limit.saturating_sub(count),
        reset_time,
    }
}

/// Fixed-window rate limiter over a shared counter store.
///
/// Holds no mutable state: every count lives in the store under a key scoped to the
/// identifier and the current window, so one instance can serve any number of concurrent
/// callers and any number of instances can share one store.
#[derive(Debug)]
pub struct FixedWindowRateLimiter<S, C = SystemClock> {
    config: RateLimitConfig,
    store: S,
    clock: C,
}

impl<S: CounterStore> FixedWindowRateLimiter<S> {
    /// Create a limiter that reads the system clock.
    pub fn new(config: RateLimitConfig, store: S) -> Self {
        Self::with_clock(config, store, SystemClock)
    }
}

impl<S: CounterStore, C: Clock> FixedWindowRateLimiter<S, C> {
    pub fn with_clock(config: RateLimitConfig, store: S, clock: C) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count this request against `identifier`'s quota and decide whether it may proceed.
    ///
    /// Issues exactly one store increment. Store failures never surface here; the only
    /// error is an empty identifier.
    pub async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitResult> {
        if identifier.trim().is_empty() {
            return Err(TollgateError::InvalidIdentifier);
        }

        let now = self.clock.now_secs();
        let window_secs = self.config.window().as_secs();
        let window_start = window::window_start(now, window_secs);
        let reset_time = window::reset_time(window_start, window_secs);

        let key = CounterKey::new(identifier, window_start);

        trace!(
            key = %key,
            window_secs = window_secs,
            "Checking rate limit"
        );

        let count = self.store.increment(&key.to_store_key(), window_secs).await;
        let result = decide(self.config.limit(), count, reset_time);

        if !result.is_allowed() {
            debug!(
                identifier = %identifier,
                count = count,
                limit = result.limit,
                reset_time = result.reset_time,
                "Rate limit exceeded"
            );
        }

        Ok(result)
    }
}

#[async_trait]
impl<S: CounterStore, C: Clock> RateLimiter for FixedWindowRateLimiter<S, C> {
    async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitResult> {
        FixedWindowRateLimiter::check_and_increment(self, identifier).await
    }
}

//! HTTP handlers for rate limit checks and health reporting.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument, warn};

use super::identity::resolve_client_identifier;
use crate::health::HealthChecker;
use crate::ratelimit::{RateLimitResult, RateLimiter};

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The rate limiter instance
    pub limiter: Arc<dyn RateLimiter>,
    pub health: Arc<HealthChecker>,
}

impl AppState {
    pub fn new(limiter: Arc<dyn RateLimiter>, health: Arc<HealthChecker>) -> Self {
        Self { limiter, health }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rate-limit", get(rate_limit_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Count the request against its client's quota.
///
/// Responds 200 when allowed and 429 when over the limit, with the quota in the
/// `X-RateLimit-*` headers either way.
#[instrument(skip(state, request), fields(uri = %request.uri()))]
async fn rate_limit_handler(State(state): State<AppState>, request: Request) -> Response {
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let identifier = resolve_client_identifier(request.headers(), remote_ip);

    match state.limiter.check_and_increment(&identifier).await {
        Ok(result) => {
            debug!(
                identifier = %identifier,
                status = ?result.status,
                remaining = result.remaining,
                "Rate limit decision made"
            );
            rate_limit_response(&result)
        }
        Err(err) => {
            warn!(identifier = %identifier, error = %err, "Rate limit check rejected");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

/// Render a decision as a status code and quota headers.
pub fn rate_limit_response(result: &RateLimitResult) -> Response {
    let status = if result.is_allowed() {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    let mut response = status.into_response();
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(result.reset_time));
    response
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.health.check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

//! HTTP surface: identifier resolution, quota headers and health reporting.

mod handlers;
mod identity;
mod server;

pub use handlers::{
    rate_limit_response, router, AppState, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING,
    RATE_LIMIT_RESET,
};
pub use identity::{resolve_client_identifier, DEFAULT_IDENTIFIER, FORWARDED_FOR};
pub use server::HttpServer;

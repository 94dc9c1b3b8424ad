//! Client identifier resolution.

use std::net::{IpAddr, Ipv4Addr};

use axum::http::HeaderMap;

/// Header carrying the original client address when behind a proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier used when neither the header nor the connection yields one.
pub const DEFAULT_IDENTIFIER: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Pick the identifier a request is rate limited under.
///
/// Prefers the first entry of `X-Forwarded-For`, then the connection's remote address, then
/// the loopback address. The result is never empty.
pub fn resolve_client_identifier(headers: &HeaderMap, remote_ip: Option<IpAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match forwarded {
        Some(first) => first.to_string(),
        None => remote_ip.unwrap_or(DEFAULT_IDENTIFIER).to_string(),
    }
}

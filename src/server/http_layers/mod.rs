mod access;
mod rate_limit;
mod requests_logging;

use axum::{body::Body, extract::ConnectInfo, http::Request};
use std::net::{IpAddr, SocketAddr};

pub use access::{check_access, AccessDenied, API_KEY_HEADER};
pub use rate_limit::{rate_limit, RateLimiter};
pub use requests_logging::{log_requests, RequestsLoggingLevel};

/// Peer address recorded by `into_make_service_with_connect_info`.
fn peer_ip(request: &Request<Body>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

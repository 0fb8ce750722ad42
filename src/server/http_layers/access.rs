//! API key and client IP checks.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;

use super::peer_ip;
use crate::server::ServerConfig;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Client address {0} is not allowed")]
    AddressNotAllowed(String),
}

impl AccessDenied {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessDenied::MissingApiKey | AccessDenied::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AccessDenied::AddressNotAllowed(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Key presented as `X-API-Key` or `Authorization: Bearer`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

pub fn check_api_key(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AccessDenied> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match presented_key(headers) {
        None => Err(AccessDenied::MissingApiKey),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AccessDenied::InvalidApiKey),
    }
}

/// An empty allow-list admits everyone; otherwise the peer must be known and listed.
pub fn check_client_ip(allowed: &[IpAddr], client: Option<IpAddr>) -> Result<(), AccessDenied> {
    if allowed.is_empty() {
        return Ok(());
    }
    match client {
        Some(ip) if allowed.contains(&ip) => Ok(()),
        Some(ip) => Err(AccessDenied::AddressNotAllowed(ip.to_string())),
        None => Err(AccessDenied::AddressNotAllowed("unknown".to_string())),
    }
}

pub async fn check_access(
    State(config): State<ServerConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = peer_ip(&request);
    let verdict = check_client_ip(&config.allowed_ips, client)
        .and_then(|_| check_api_key(config.api_key.as_deref(), request.headers()));

    match verdict {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            warn!(
                "Rejected {} {} from {:?}: {}",
                request.method(),
                request.uri().path(),
                client,
                denied
            );
            denied.into_response()
        }
    }
}

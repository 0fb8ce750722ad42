//! Per-client fixed-window rate limiting.
//!
//! Each client IP gets `max_requests` per window; the counter resets when the
//! window expires. Requests over the limit get 429 with `Retry-After`.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

use super::peer_ip;
use crate::server::metrics::record_rate_limit_hit;
use crate::server::state::GuardedRateLimiter;

/// Windows idle for this many window lengths are pruned.
const STALE_WINDOWS: u32 = 5;

#[derive(Debug)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
}

impl ClientWindow {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn reset_if_expired(&mut self, window: Duration) {
        if self.window_start.elapsed() >= window {
            self.count = 0;
            self.window_start = Instant::now();
        }
    }
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check if a request is allowed and record it if so.
    /// Returns Err(retry_after_secs) when the client is over the limit.
    pub fn check_and_record(&self, client: IpAddr) -> Result<(), u64> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let state = clients.entry(client).or_insert_with(ClientWindow::new);

        state.reset_if_expired(self.window);

        if state.count >= self.max_requests {
            let remaining = self.window.saturating_sub(state.window_start.elapsed());
            return Err(remaining.as_secs().max(1));
        }

        state.count += 1;
        Ok(())
    }

    /// Requests recorded for `client` in its current window.
    #[cfg(test)]
    fn usage(&self, client: IpAddr) -> Option<u32> {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.get(&client).map(|s| s.count)
    }

    /// Clean up old entries (call periodically)
    pub fn cleanup_stale_entries(&self) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let threshold = self.window * STALE_WINDOWS;
        clients.retain(|_, state| state.window_start.elapsed() < threshold);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Middleware applying the limiter to the peer address.
pub async fn rate_limit(
    State(limiter): State<GuardedRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(client) = peer_ip(&request) else {
        return next.run(request).await;
    };

    match limiter.check_and_record(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let path = request.uri().path().to_string();
            warn!("Rate limit exceeded for {} on {}", client, path);
            record_rate_limit_hit(&path);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(json!({
                    "error": format!("Rate limit exceeded, retry after {} seconds", retry_after)
                })),
            )
                .into_response()
        }
    }
}

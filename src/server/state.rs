use axum::extract::FromRef;

use crate::mcp::ToolDispatcher;
use std::sync::Arc;
use std::time::Instant;

use super::http_layers::RateLimiter;
use super::ServerConfig;

pub type GuardedDispatcher = Arc<ToolDispatcher>;
pub type GuardedRateLimiter = Arc<RateLimiter>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub dispatcher: GuardedDispatcher,
    pub rate_limiter: GuardedRateLimiter,
}

impl ServerState {
    pub fn new(config: ServerConfig, dispatcher: GuardedDispatcher) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        ServerState {
            config,
            start_time: Instant::now(),
            dispatcher,
            rate_limiter,
        }
    }
}

impl FromRef<ServerState> for GuardedDispatcher {
    fn from_ref(input: &ServerState) -> Self {
        input.dispatcher.clone()
    }
}

impl FromRef<ServerState> for GuardedRateLimiter {
    fn from_ref(input: &ServerState) -> Self {
        input.rate_limiter.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

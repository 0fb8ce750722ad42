use std::net::IpAddr;
use std::time::Duration;

use super::RequestsLoggingLevel;
use crate::mcp::{McpMode, StreamSettings};

/// Settings of the HTTP surface. Built once at startup and never mutated.
#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub host: String,
    pub port: u16,
    pub server_name: String,
    pub server_version: String,
    pub mode: McpMode,
    /// When set, every route but `/health` requires this key.
    pub api_key: Option<String>,
    /// Empty means any client address is accepted.
    pub allowed_ips: Vec<IpAddr>,
    /// `*` admits any origin.
    pub cors_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub stream: StreamSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            host: "0.0.0.0".to_string(),
            port: 8000,
            server_name: "odoo-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            mode: McpMode::Readonly,
            api_key: None,
            allowed_ips: Vec::new(),
            cors_origins: vec!["*".to_string()],
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(60),
            stream: StreamSettings::default(),
        }
    }
}

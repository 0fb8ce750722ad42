use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration. Every present key overrides the CLI/env value.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: Option<bool>,
    pub mode: Option<String>,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub logging_level: Option<String>,

    // Sections
    pub odoo: Option<OdooFileConfig>,
    pub security: Option<SecurityFileConfig>,
    pub stream: Option<StreamFileConfig>,
}

#[derive(Deserialize, Default, Clone)]
#[serde(default)]
pub struct OdooFileConfig {
    pub url: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_sec: Option<u64>,
}

impl std::fmt::Debug for OdooFileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooFileConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_sec", &self.timeout_sec)
            .finish()
    }
}

#[derive(Deserialize, Default, Clone)]
#[serde(default)]
pub struct SecurityFileConfig {
    pub api_key: Option<String>,
    pub allowed_ips: Option<Vec<String>>,
    pub cors_origins: Option<Vec<String>>,
    pub rate_limit_requests: Option<u32>,
    pub rate_limit_window_sec: Option<u64>,
}

impl std::fmt::Debug for SecurityFileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityFileConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("allowed_ips", &self.allowed_ips)
            .field("cors_origins", &self.cors_origins)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window_sec", &self.rate_limit_window_sec)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StreamFileConfig {
    pub chunk_size: Option<usize>,
    /// Seconds, fractional values allowed.
    pub delay_sec: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

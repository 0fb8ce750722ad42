mod file_config;

pub use file_config::{FileConfig, OdooFileConfig, SecurityFileConfig, StreamFileConfig};

use anyhow::{bail, Context, Result};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::mcp::{McpMode, StreamSettings};
use crate::server::{RequestsLoggingLevel, ServerConfig};

/// Credentials and endpoint of the Odoo instance.
#[derive(Clone)]
pub struct OdooSettings {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout_sec: u64,
}

impl fmt::Debug for OdooSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooSettings")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_sec", &self.timeout_sec)
            .finish()
    }
}

/// Values gathered from the command line and the environment.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub odoo_url: String,
    pub odoo_database: String,
    pub odoo_username: String,
    pub odoo_password: String,
    pub odoo_timeout_sec: u64,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub mode: String,
    pub server_name: String,
    pub server_version: String,
    pub api_key: Option<String>,
    /// Comma separated.
    pub allowed_ips: Option<String>,
    /// Comma separated, `*` admits any origin.
    pub cors_origins: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window_sec: u64,
    pub stream_chunk_size: usize,
    /// Seconds between two streamed chunks.
    pub stream_delay_sec: f64,
    pub logging_level: RequestsLoggingLevel,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            odoo_url: "http://localhost:8069".to_string(),
            odoo_database: "odoo".to_string(),
            odoo_username: "admin".to_string(),
            odoo_password: "admin".to_string(),
            odoo_timeout_sec: 30,
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
            mode: McpMode::default().to_string(),
            server_name: "odoo-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            api_key: None,
            allowed_ips: None,
            cors_origins: "*".to_string(),
            rate_limit_requests: 100,
            rate_limit_window_sec: 60,
            stream_chunk_size: 10,
            stream_delay_sec: 0.1,
            logging_level: RequestsLoggingLevel::Path,
        }
    }
}

/// Fully resolved and validated configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub odoo: OdooSettings,
    pub server: ServerConfig,
    pub debug: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl AppConfig {
    /// Resolve configuration from CLI args and optional file config.
    /// Values present in the TOML file take precedence over CLI and environment.
    pub fn resolve(cli: &CliConfig, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let odoo_file = file.odoo.unwrap_or_default();
        let security = file.security.unwrap_or_default();
        let stream_file = file.stream.unwrap_or_default();

        let odoo = OdooSettings {
            url: odoo_file.url.unwrap_or_else(|| cli.odoo_url.clone()),
            database: odoo_file
                .database
                .unwrap_or_else(|| cli.odoo_database.clone()),
            username: odoo_file
                .username
                .unwrap_or_else(|| cli.odoo_username.clone()),
            password: odoo_file
                .password
                .unwrap_or_else(|| cli.odoo_password.clone()),
            timeout_sec: odoo_file.timeout_sec.unwrap_or(cli.odoo_timeout_sec),
        };
        validate_odoo(&odoo)?;

        let mode_str = file.mode.unwrap_or_else(|| cli.mode.clone());
        let mode: McpMode = mode_str
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid MCP mode")?;

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .with_context(|| format!("Invalid requests logging level: {}", s))?,
            None => cli.logging_level,
        };

        let allowed_ips = match security.allowed_ips {
            Some(list) => parse_ip_list(list.iter().map(String::as_str))?,
            None => parse_ip_list(split_list(cli.allowed_ips.as_deref().unwrap_or("")))?,
        };

        let cors_origins: Vec<String> = match security.cors_origins {
            Some(list) => list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => split_list(&cli.cors_origins).map(str::to_string).collect(),
        };

        let rate_limit_requests = security
            .rate_limit_requests
            .unwrap_or(cli.rate_limit_requests);
        if rate_limit_requests == 0 {
            bail!("Rate limit requests must be at least 1");
        }
        let rate_limit_window_sec = security
            .rate_limit_window_sec
            .unwrap_or(cli.rate_limit_window_sec);
        if rate_limit_window_sec == 0 {
            bail!("Rate limit window must be at least 1 second");
        }

        let chunk_size = stream_file.chunk_size.unwrap_or(cli.stream_chunk_size);
        if chunk_size == 0 {
            bail!("Stream chunk size must be at least 1");
        }
        let delay_sec = stream_file.delay_sec.unwrap_or(cli.stream_delay_sec);
        let delay = Duration::try_from_secs_f64(delay_sec)
            .with_context(|| format!("Invalid stream delay: {}", delay_sec))?;

        let api_key = security
            .api_key
            .or_else(|| cli.api_key.clone())
            .filter(|key| !key.is_empty());

        let server = ServerConfig {
            requests_logging_level: logging_level,
            host: file.host.unwrap_or_else(|| cli.host.clone()),
            port: file.port.unwrap_or(cli.port),
            server_name: file.server_name.unwrap_or_else(|| cli.server_name.clone()),
            server_version: file
                .server_version
                .unwrap_or_else(|| cli.server_version.clone()),
            mode,
            api_key,
            allowed_ips,
            cors_origins,
            rate_limit_requests,
            rate_limit_window: Duration::from_secs(rate_limit_window_sec),
            stream: StreamSettings { chunk_size, delay },
        };

        Ok(AppConfig {
            odoo,
            server,
            debug: file.debug.unwrap_or(cli.debug),
        })
    }

    /// Default log level, before any `LOG_LEVEL` directive is applied.
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    /// One line description for the startup log, secrets left out.
    pub fn summary(&self) -> String {
        format!(
            "odoo={} db={} user={} mode={} listen={}:{} api_key={} allowed_ips={} cors={} \
             rate_limit={}/{}s stream={}x{:?} debug={}",
            self.odoo.url,
            self.odoo.database,
            self.odoo.username,
            self.server.mode,
            self.server.host,
            self.server.port,
            if self.server.api_key.is_some() { "set" } else { "unset" },
            self.server.allowed_ips.len(),
            self.server.cors_origins.join(","),
            self.server.rate_limit_requests,
            self.server.rate_limit_window.as_secs(),
            self.server.stream.chunk_size,
            self.server.stream.delay,
            self.debug,
        )
    }
}

fn validate_odoo(odoo: &OdooSettings) -> Result<()> {
    if !(odoo.url.starts_with("http://") || odoo.url.starts_with("https://")) {
        bail!("Odoo URL must start with http:// or https://, got {}", odoo.url);
    }
    if odoo.database.trim().is_empty() {
        bail!("Odoo database must not be empty");
    }
    if odoo.username.trim().is_empty() {
        bail!("Odoo username must not be empty");
    }
    if odoo.password.is_empty() {
        bail!("Odoo password must not be empty");
    }
    Ok(())
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_ip_list<'a>(items: impl Iterator<Item = &'a str>) -> Result<Vec<IpAddr>> {
    items
        .map(|item| {
            item.trim()
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid IP address in allowed list: {}", item))
        })
        .collect()
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    use clap::ValueEnum;
    RequestsLoggingLevel::from_str(s, true).ok()
}

/// Accepts the usual spellings of a boolean environment flag.
pub fn parse_bool_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean value: {}", other)),
    }
}

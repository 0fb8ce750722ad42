use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use odoo_mcp_gateway::config::parse_bool_flag;
use odoo_mcp_gateway::{
    run_server, AppConfig, CliConfig, FileConfig, OdooClient, OdooRemote, RequestsLoggingLevel,
};

#[derive(Parser, Debug)]
#[clap(version, about = "MCP gateway in front of an Odoo server")]
struct CliArgs {
    /// Base URL of the Odoo server.
    #[clap(long, env = "ODOO_URL", default_value = "http://localhost:8069")]
    pub odoo_url: String,

    /// Odoo database name.
    #[clap(long, env = "ODOO_DATABASE", default_value = "odoo")]
    pub odoo_database: String,

    #[clap(long, env = "ODOO_USERNAME", default_value = "admin")]
    pub odoo_username: String,

    #[clap(long, env = "ODOO_PASSWORD", default_value = "admin", hide_env_values = true)]
    pub odoo_password: String,

    /// Timeout in seconds for each Odoo request.
    #[clap(long, env = "ODOO_TIMEOUT", default_value_t = 30)]
    pub odoo_timeout_sec: u64,

    /// The address to bind.
    #[clap(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Enables debug logging unless LOG_LEVEL says otherwise.
    #[clap(long, env = "DEBUG", default_value = "false", action = clap::ArgAction::Set, value_parser = parse_bool_flag)]
    pub debug: bool,

    /// Permission mode: readonly or readwrite.
    #[clap(long, env = "MCP_MODE", default_value = "readonly")]
    pub mode: String,

    #[clap(long, env = "MCP_SERVER_NAME", default_value = "odoo-mcp-server")]
    pub server_name: String,

    #[clap(long, env = "MCP_SERVER_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub server_version: String,

    /// Key required on every route but /health.
    #[clap(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Comma separated list of client addresses allowed to connect.
    #[clap(long, env = "ALLOWED_IPS")]
    pub allowed_ips: Option<String>,

    /// Comma separated list of allowed CORS origins.
    #[clap(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Requests allowed per client within one window.
    #[clap(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 100)]
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds.
    #[clap(long, env = "RATE_LIMIT_WINDOW", default_value_t = 60)]
    pub rate_limit_window_sec: u64,

    /// Records per streamed chunk.
    #[clap(long, env = "STREAM_CHUNK_SIZE", default_value_t = 10)]
    pub stream_chunk_size: usize,

    /// Pause between streamed chunks, in seconds.
    #[clap(long, env = "STREAM_DELAY", default_value_t = 0.1)]
    pub stream_delay_sec: f64,

    /// The level of logging to perform on each request.
    #[clap(long, env = "REQUESTS_LOGGING_LEVEL", default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Optional TOML file, its values override the ones above.
    #[clap(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            odoo_url: self.odoo_url.clone(),
            odoo_database: self.odoo_database.clone(),
            odoo_username: self.odoo_username.clone(),
            odoo_password: self.odoo_password.clone(),
            odoo_timeout_sec: self.odoo_timeout_sec,
            host: self.host.clone(),
            port: self.port,
            debug: self.debug,
            mode: self.mode.clone(),
            server_name: self.server_name.clone(),
            server_version: self.server_version.clone(),
            api_key: self.api_key.clone(),
            allowed_ips: self.allowed_ips.clone(),
            cors_origins: self.cors_origins.clone(),
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window_sec: self.rate_limit_window_sec,
            stream_chunk_size: self.stream_chunk_size,
            stream_delay_sec: self.stream_delay_sec,
            logging_level: self.logging_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    // Resolved before logging starts, so `debug` from the file picks the level.
    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(config.log_level().into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    if let Some(path) = &cli_args.config {
        info!("Loaded configuration file {:?}", path);
    }
    info!("Configuration: {}", config.summary());

    let client = OdooClient::new(&config.odoo)?;
    // The gateway still starts when Odoo is down, calls fail until it comes back.
    match client.version().await {
        Ok(version) => info!(
            "Connected to Odoo at {} (server version {})",
            client.base_url(),
            version
                .get("server_version")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
        ),
        Err(e) => warn!("Odoo at {} is not reachable yet: {}", client.base_url(), e),
    }

    let remote: Arc<dyn OdooRemote> = Arc::new(client);
    run_server(config.server, remote).await
}

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use super::mcp_routes::make_mcp_routes;
use super::metrics::metrics_handler;
use super::odoo_routes::make_odoo_routes;
use super::{check_access, log_requests, rate_limit, state::*, ServerConfig};
use crate::mcp::ToolDispatcher;
use crate::odoo::OdooRemote;

#[derive(Serialize)]
struct ServerStats {
    pub name: String,
    pub version: String,
    pub mode: String,
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        name: state.config.server_name.clone(),
        version: state.config.server_version.clone(),
        mode: state.config.mode.to_string(),
        uptime: format_uptime(state.start_time.elapsed()),
    };
    Json(stats)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: String,
}

async fn health(State(config): State<ServerConfig>) -> impl IntoResponse {
    Json(Health {
        status: "healthy",
        service: config.server_name,
    })
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn make_app(config: ServerConfig, remote: Arc<dyn OdooRemote>) -> Result<Router> {
    let dispatcher = Arc::new(ToolDispatcher::new(config.mode, remote));
    let state = ServerState::new(config.clone(), dispatcher);
    build_router(state)
}

fn build_router(state: ServerState) -> Result<Router> {
    // Layers run outermost-last: access check, then rate limit.
    let protected: Router<ServerState> = Router::new()
        .route("/", get(home))
        .merge(make_mcp_routes())
        .merge(make_odoo_routes())
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), check_access));

    let app = Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(cors_layer(&state.config.cors_origins)?)
        .with_state(state);

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(config: ServerConfig, remote: Arc<dyn OdooRemote>) -> Result<()> {
    super::metrics::init_metrics();

    let dispatcher = Arc::new(ToolDispatcher::new(config.mode, remote));
    let state = ServerState::new(config.clone(), dispatcher);
    let limiter = state.rate_limiter.clone();
    let app = build_router(state)?;

    // Prune idle rate limit windows.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        loop {
            interval.tick().await;
            limiter.cleanup_stale_entries();
        }
    });

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(
        "Listening on {} (mode: {}, server: {} {})",
        address, config.mode, config.server_name, config.server_version
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")
}

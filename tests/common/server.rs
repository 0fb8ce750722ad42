//! Test server lifecycle management
//!
//! Each test gets its own router on a random port, backed by its own fake Odoo.

use super::constants::*;
use super::fake_odoo::FakeOdoo;
use odoo_mcp_gateway::mcp::{McpMode, StreamSettings};
use odoo_mcp_gateway::odoo::OdooRemote;
use odoo_mcp_gateway::{make_app, RequestsLoggingLevel, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Running gateway instance
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The fake Odoo behind the gateway
    pub odoo: Arc<FakeOdoo>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// Configuration used by every test server unless overridden
pub fn test_config(mode: McpMode) -> ServerConfig {
    ServerConfig {
        requests_logging_level: RequestsLoggingLevel::None,
        host: "127.0.0.1".to_string(),
        mode,
        stream: StreamSettings {
            chunk_size: 10,
            delay: Duration::ZERO,
        },
        ..Default::default()
    }
}

impl TestServer {
    /// Spawns a server in the given mode over a seeded fake Odoo
    pub async fn spawn(mode: McpMode) -> Self {
        Self::spawn_with(test_config(mode), FakeOdoo::seeded()).await
    }

    /// Spawns a readonly server requiring `TEST_API_KEY`
    pub async fn spawn_with_api_key() -> Self {
        let config = ServerConfig {
            api_key: Some(TEST_API_KEY.to_string()),
            ..test_config(McpMode::Readonly)
        };
        Self::spawn_with(config, FakeOdoo::seeded()).await
    }

    /// Spawns a server with an explicit configuration and fake
    ///
    /// # Panics
    ///
    /// Panics if binding fails or the server doesn't become ready in time.
    pub async fn spawn_with(mut config: ServerConfig, odoo: FakeOdoo) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        config.port = port;
        let base_url = format!("http://127.0.0.1:{}", port);

        let odoo = Arc::new(odoo);
        let remote: Arc<dyn OdooRemote> = odoo.clone();
        let app = make_app(config, remote).expect("Failed to build app");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            odoo,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// WebSocket URL of the MCP endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/mcp/ws", self.port)
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

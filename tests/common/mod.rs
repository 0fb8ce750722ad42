//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//! use odoo_mcp_gateway::McpMode;
//!
//! #[tokio::test]
//! async fn test_mode() {
//!     let server = TestServer::spawn(McpMode::Readonly).await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.mode().await;
//!     assert!(response.status().is_success());
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod fake_odoo;
mod server;

pub use client::{parse_sse_events, TestClient};
pub use constants::*;
pub use fake_odoo::{FakeOdoo, RecordedCall};
pub use server::{test_config, TestServer};

//! Odoo MCP Gateway Library
//!
//! Exposes the gateway modules for the binary and the end-to-end tests.

pub mod config;
pub mod mcp;
pub mod odoo;
pub mod server;

pub use config::{AppConfig, CliConfig, FileConfig, OdooSettings};
pub use mcp::{McpMode, ToolDispatcher};
pub use odoo::{OdooClient, OdooRemote, RemoteError};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};

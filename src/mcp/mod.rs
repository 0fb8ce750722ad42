//! MCP (Model Context Protocol) gateway core
//!
//! Exposes the Odoo tool catalog to MCP clients.
//!
//! ## Architecture
//!
//! - Mode Policy (`mode`): readonly/readwrite gating of tools and methods
//! - Tool Dispatcher (`dispatcher`): validation, policy check, remote call
//! - Streaming Emitter (`streaming`): chunked re-emission of large results
//! - Transport: HTTP routes in `server`, WebSocket at `/mcp/ws` (`handler`)

pub mod dispatcher;
pub mod handler;
pub mod mode;
pub mod protocol;
pub mod resources;
pub mod streaming;
pub mod tools;

pub use dispatcher::{DispatchError, PermissionDenied, ToolDispatcher};
pub use handler::mcp_handler;
pub use mode::McpMode;
pub use protocol::{McpError, McpRequest, McpResponse, ResultEnvelope};
pub use streaming::{stream_tool_call, StreamChunk, StreamSettings};
pub use tools::OdooTool;

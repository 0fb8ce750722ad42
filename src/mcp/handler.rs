//! MCP WebSocket Handler
//!
//! JSON-RPC over WebSocket at `/mcp/ws`. Each text frame is one request and
//! gets one correlated response, except notifications.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::dispatcher::ToolDispatcher;
use super::mode::mode_info;
use super::protocol::{
    methods, InitializeResult, McpError, McpRequest, McpResponse, RequestId,
    ResourcesListResult, ResourcesReadParams, ServerInfo, ToolsCallParams, ToolsListResult,
};
use super::resources::OdooResource;
use super::tools::OdooTool;
use crate::server::metrics;
use crate::server::state::GuardedDispatcher;
use crate::server::ServerConfig;

/// WebSocket upgrade handler for MCP
pub async fn mcp_handler(
    ws: WebSocketUpgrade,
    State(dispatcher): State<GuardedDispatcher>,
    State(config): State<ServerConfig>,
) -> Response {
    let connection_id = Uuid::new_v4();
    info!("MCP WebSocket upgrade, connection {}", connection_id);

    let server_info = ServerInfo {
        name: config.server_name.clone(),
        version: config.server_version.clone(),
    };
    ws.on_upgrade(move |socket| handle_mcp_socket(socket, connection_id, dispatcher, server_info))
}

/// Handle an established MCP WebSocket connection
async fn handle_mcp_socket(
    socket: WebSocket,
    connection_id: Uuid,
    dispatcher: Arc<ToolDispatcher>,
    server_info: ServerInfo,
) {
    debug!("MCP connection {} established", connection_id);
    metrics::ws_connection_opened();

    let (mut ws_sink, mut ws_stream) = socket.split();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = handle_message(&text, &dispatcher, &server_info).await;

                if let Some(response) = response {
                    match serde_json::to_string(&response) {
                        Ok(json) => {
                            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize MCP response: {}", e);
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }

    metrics::ws_connection_closed();
    debug!("MCP connection {} closed", connection_id);
}

/// Handle a single MCP message
pub(crate) async fn handle_message(
    text: &str,
    dispatcher: &ToolDispatcher,
    server_info: &ServerInfo,
) -> Option<McpResponse> {
    let raw: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Some(McpResponse::error(None, McpError::ParseError(e.to_string())));
        }
    };

    let request: McpRequest = match serde_json::from_value(raw.clone()) {
        Ok(req) => req,
        Err(e) => {
            // Still correlate when the id itself is readable.
            let id = raw
                .get("id")
                .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
            return Some(McpResponse::error(id, McpError::InvalidRequest(e.to_string())));
        }
    };

    let request_id = request.id.clone();
    debug!("MCP request {} (id {:?})", request.method, request_id);

    let result = match request.method.as_str() {
        methods::INITIALIZE => to_json(InitializeResult::new(server_info.clone(), dispatcher.mode())),
        methods::INITIALIZED | methods::SHUTDOWN => {
            // Notifications, no response
            return None;
        }
        methods::PING => Ok(Value::Object(Default::default())),
        methods::TOOLS_LIST => to_json(ToolsListResult {
            tools: OdooTool::definitions(),
        }),
        methods::TOOLS_CALL => handle_tools_call(&request, dispatcher).await,
        methods::RESOURCES_LIST => to_json(ResourcesListResult {
            resources: OdooResource::definitions(),
        }),
        methods::RESOURCES_READ => handle_resources_read(&request, dispatcher).await,
        methods::MODE => to_json(mode_info(dispatcher.mode())),
        other => Err(McpError::MethodNotFound(other.to_string())),
    };

    Some(match result {
        Ok(value) => McpResponse::success(request_id, value),
        Err(error) => McpResponse::error(request_id, error),
    })
}

fn to_json<T: Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}

fn parse_params<T: serde::de::DeserializeOwned>(request: &McpRequest) -> Result<T, McpError> {
    let params = request
        .params
        .clone()
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

async fn handle_tools_call(
    request: &McpRequest,
    dispatcher: &ToolDispatcher,
) -> Result<Value, McpError> {
    let params: ToolsCallParams = parse_params(request)?;
    let envelope = dispatcher
        .invoke(&params.name, params.arguments.unwrap_or_default())
        .await?;
    Ok(envelope.result.unwrap_or_default())
}

async fn handle_resources_read(
    request: &McpRequest,
    dispatcher: &ToolDispatcher,
) -> Result<Value, McpError> {
    let params: ResourcesReadParams = parse_params(request)?;
    to_json(dispatcher.read_resource(&params.uri).await?)
}

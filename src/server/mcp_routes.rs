//! HTTP endpoints of the MCP surface under `/mcp`.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use super::state::{GuardedDispatcher, ServerState};
use super::ServerConfig;
use crate::mcp::mode::mode_info;
use crate::mcp::protocol::{
    HttpMcpRequest, InitializeResult, RequestId, ResourcesListResult, ResourcesReadParams,
    ResultEnvelope, ServerInfo, ToolsListResult,
};
use crate::mcp::resources::OdooResource;
use crate::mcp::{mcp_handler, stream_tool_call, DispatchError, OdooTool, StreamChunk};

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Error body with the request id echoed back.
pub(super) fn error_response(status: StatusCode, message: String, id: Option<RequestId>) -> Response {
    (status, Json(ResultEnvelope::failure(message).with_id(id))).into_response()
}

pub(super) fn dispatch_error_response(err: DispatchError, id: Option<RequestId>) -> Response {
    error_response(err.http_status(), err.to_string(), id)
}

/// Decodes a request body, answering malformed or mistyped JSON with the error envelope.
pub(super) fn decode_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(T, Option<RequestId>), Response> {
    let Json(raw) = body.map_err(|rejection| {
        error_response(rejection.status(), rejection.body_text(), None)
    })?;
    let id = raw
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
    match serde_json::from_value(raw) {
        Ok(decoded) => Ok((decoded, id)),
        Err(e) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", e),
            id,
        )),
    }
}

fn missing_method(id: Option<RequestId>) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "Missing 'method' (tool name)".to_string(),
        id,
    )
}

async fn initialize(
    State(config): State<ServerConfig>,
    State(dispatcher): State<GuardedDispatcher>,
) -> Json<InitializeResult> {
    let server_info = ServerInfo {
        name: config.server_name,
        version: config.server_version,
    };
    Json(InitializeResult::new(server_info, dispatcher.mode()))
}

async fn tools_list() -> Json<ToolsListResult> {
    Json(ToolsListResult {
        tools: OdooTool::definitions(),
    })
}

async fn tools_call(
    State(dispatcher): State<GuardedDispatcher>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body: HttpMcpRequest = match decode_body(body) {
        Ok((body, _)) => body,
        Err(response) => return response,
    };
    let Some(tool) = body.method else {
        return missing_method(body.id);
    };

    match dispatcher.invoke(&tool, body.params).await {
        Ok(envelope) => Json(envelope.with_id(body.id)).into_response(),
        Err(e) => dispatch_error_response(e, body.id),
    }
}

fn to_event(chunk: StreamChunk) -> Result<Event, Infallible> {
    let json = serde_json::to_string(&chunk).unwrap_or_else(|e| {
        error!("Failed to serialize stream chunk: {}", e);
        "{}".to_string()
    });
    Ok(Event::default().data(json))
}

fn chunk_events(
    state: &ServerState,
    tool: String,
    params: Value,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream_tool_call(state.dispatcher.clone(), tool, params, state.config.stream).map(to_event)
}

async fn stream_tools_call(
    State(state): State<ServerState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body: HttpMcpRequest = match decode_body(body) {
        Ok((body, _)) => body,
        Err(response) => return response,
    };
    let Some(tool) = body.method else {
        return missing_method(body.id);
    };
    debug!("Streaming tool call {}", tool);

    Sse::new(chunk_events(&state, tool, body.params))
        .keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
        .into_response()
}

async fn mode(State(dispatcher): State<GuardedDispatcher>) -> impl IntoResponse {
    Json(mode_info(dispatcher.mode()))
}

async fn resources_list() -> Json<ResourcesListResult> {
    Json(ResourcesListResult {
        resources: OdooResource::definitions(),
    })
}

async fn resources_read(
    State(dispatcher): State<GuardedDispatcher>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body: HttpMcpRequest = match decode_body(body) {
        Ok((body, _)) => body,
        Err(response) => return response,
    };
    let params: ResourcesReadParams = match serde_json::from_value(body.params) {
        Ok(params) => params,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid params: {}", e),
                body.id,
            )
        }
    };

    match dispatcher.read_resource(&params.uri).await {
        Ok(result) => match serde_json::to_value(result) {
            Ok(value) => Json(ResultEnvelope::success(value).with_id(body.id)).into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), body.id),
        },
        Err(e) => dispatch_error_response(e, body.id),
    }
}

pub fn make_mcp_routes() -> Router<ServerState> {
    Router::new()
        .route("/mcp/initialize", post(initialize))
        .route("/mcp/tools/list", post(tools_list))
        .route("/mcp/tools/call", post(tools_call))
        .route("/mcp/stream/tools/call", post(stream_tools_call))
        .route("/mcp/mode", get(mode))
        .route("/mcp/resources/list", post(resources_list))
        .route("/mcp/resources/read", post(resources_read))
        .route("/mcp/ws", get(mcp_handler))
}

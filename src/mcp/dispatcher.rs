//! Tool Dispatcher
//!
//! Validates a tool invocation, applies the Mode Policy and forwards the call
//! to the [`OdooRemote`]. Denied calls never reach the remote side.

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::mode::{self, McpMode};
use super::protocol::{McpError, ResourcesReadResult, ResultEnvelope};
use super::resources;
use super::tools::{
    CallParams, CreateParams, FieldsGetParams, OdooTool, ReportParams, SearchParams,
    UnlinkParams, WriteParams,
};
use crate::odoo::{OdooRemote, RemoteError, SearchOptions};
use crate::server::metrics;

/// A call rejected by the Mode Policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDenied {
    pub tool: OdooTool,
    pub method: Option<String>,
    pub mode: McpMode,
}

impl fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(
                f,
                "method '{}' of tool '{}' is not allowed in {} mode",
                method,
                self.tool.name(),
                self.mode
            ),
            None => write!(
                f,
                "tool '{}' is not allowed in {} mode",
                self.tool.name(),
                self.mode
            ),
        }
    }
}

impl std::error::Error for PermissionDenied {}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters for {tool}: {message}")]
    Validation { tool: String, message: String },

    #[error("Permission denied: {0}")]
    Permission(#[from] PermissionDenied),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

impl DispatchError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            DispatchError::UnknownTool(_) => StatusCode::NOT_FOUND,
            DispatchError::Validation { .. } => StatusCode::BAD_REQUEST,
            DispatchError::Permission(_) => StatusCode::FORBIDDEN,
            DispatchError::Remote(_) => StatusCode::BAD_GATEWAY,
            DispatchError::UnknownResource(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Short label used for metrics.
    fn outcome(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool(_) => "unknown_tool",
            DispatchError::Validation { .. } => "invalid_params",
            DispatchError::Permission(_) => "denied",
            DispatchError::Remote(_) => "remote_error",
            DispatchError::UnknownResource(_) => "unknown_resource",
        }
    }
}

impl From<DispatchError> for McpError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownTool(name) => McpError::MethodNotFound(name),
            DispatchError::Validation { tool, message } => {
                McpError::InvalidParams(format!("{}: {}", tool, message))
            }
            DispatchError::Permission(denied) => McpError::PermissionDenied(denied.to_string()),
            DispatchError::Remote(remote) => McpError::ToolExecutionFailed(remote.to_string()),
            DispatchError::UnknownResource(uri) => McpError::ResourceNotFound(uri),
        }
    }
}

pub struct ToolDispatcher {
    mode: McpMode,
    remote: Arc<dyn OdooRemote>,
}

impl ToolDispatcher {
    pub fn new(mode: McpMode, remote: Arc<dyn OdooRemote>) -> Self {
        Self { mode, remote }
    }

    pub fn mode(&self) -> McpMode {
        self.mode
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, tool_name: &str, params: Value) -> Result<ResultEnvelope, DispatchError> {
        let started = Instant::now();
        let result = match tool_name.parse::<OdooTool>() {
            Ok(tool) => self.invoke_tool(tool, params).await,
            Err(name) => Err(DispatchError::UnknownTool(name)),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::record_tool_call(tool_name, outcome, started.elapsed());
        result
    }

    pub async fn invoke_tool(
        &self,
        tool: OdooTool,
        params: Value,
    ) -> Result<ResultEnvelope, DispatchError> {
        let params = prepare_params(tool, params)?;
        debug!(tool = tool.name(), mode = %self.mode, "Dispatching tool call");

        let result = match tool {
            OdooTool::Search => {
                let p: SearchParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let options = SearchOptions {
                    fields: p.fields,
                    limit: Some(p.limit),
                    offset: p.offset,
                    order: p.order,
                };
                let records = self
                    .remote
                    .search_read(&p.model, p.domain, options)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "count": records.len(), "records": records})
            }
            OdooTool::Create => {
                let p: CreateParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let created_id = self
                    .remote
                    .create(&p.model, p.values)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "created_id": created_id, "success": true})
            }
            OdooTool::Write => {
                let p: WriteParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let success = self
                    .remote
                    .write(&p.model, &p.ids, p.values)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "updated_ids": p.ids, "success": success})
            }
            OdooTool::Unlink => {
                let p: UnlinkParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let success = self
                    .remote
                    .unlink(&p.model, &p.ids)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "deleted_ids": p.ids, "success": success})
            }
            OdooTool::Call => {
                let p: CallParams = decode(tool, params)?;
                self.authorize(tool, Some(&p.method))?;
                let result = self
                    .remote
                    .call(&p.model, &p.method, p.args, p.kwargs)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "method": p.method, "result": result})
            }
            OdooTool::FieldsGet => {
                let p: FieldsGetParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let fields = self
                    .remote
                    .fields_get(&p.model, &p.fields)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({"model": p.model, "fields": fields})
            }
            OdooTool::Report => {
                let p: ReportParams = decode(tool, params)?;
                self.authorize(tool, None)?;
                let data = self
                    .remote
                    .report(&p.report_name, &p.record_ids)
                    .await
                    .map_err(|e| remote_failure(tool, e))?;
                json!({
                    "report_name": p.report_name,
                    "record_ids": p.record_ids,
                    "format": p.format,
                    "data": data,
                })
            }
        };

        Ok(ResultEnvelope::success(result))
    }

    /// Read one of the fixed resources. Allowed in every mode.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourcesReadResult, DispatchError> {
        resources::read_resource(self.remote.as_ref(), uri).await
    }

    fn authorize(&self, tool: OdooTool, method: Option<&str>) -> Result<(), PermissionDenied> {
        if mode::is_allowed(self.mode, tool, method) {
            return Ok(());
        }

        // Only report the method when it is what tipped the decision.
        let method = method
            .filter(|_| mode::is_tool_allowed(self.mode, tool))
            .map(str::to_string);
        let denied = PermissionDenied {
            tool,
            method,
            mode: self.mode,
        };
        warn!("Rejected call: {}", denied);
        metrics::record_permission_denial(tool.name(), self.mode.as_str());
        Err(denied)
    }
}

fn remote_failure(tool: OdooTool, err: RemoteError) -> DispatchError {
    error!("Remote call for {} failed: {}", tool.name(), err);
    DispatchError::Remote(err)
}

/// Turn raw params into an object, dropping null values, and check the
/// required fields of `tool` are present.
fn prepare_params(tool: OdooTool, params: Value) -> Result<Map<String, Value>, DispatchError> {
    let mut params = match params {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(DispatchError::Validation {
                tool: tool.name().to_string(),
                message: format!("params must be an object, got {}", json_type(&other)),
            })
        }
    };
    params.retain(|_, value| !value.is_null());

    let missing: Vec<&str> = tool
        .required_params()
        .iter()
        .copied()
        .filter(|name| !params.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::Validation {
            tool: tool.name().to_string(),
            message: format!("missing required parameter(s): {}", missing.join(", ")),
        });
    }

    Ok(params)
}

fn decode<T: DeserializeOwned>(tool: OdooTool, params: Map<String, Value>) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(params)).map_err(|e| DispatchError::Validation {
        tool: tool.name().to_string(),
        message: e.to_string(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

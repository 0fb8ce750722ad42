//! HTTP client for the Odoo external API.
//!
//! Talks JSON-RPC to the `/jsonrpc` endpoint: `common.authenticate` once per
//! client, then `object.execute_kw` for every model call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::trait_def::{OdooRemote, RemoteError, SearchOptions};
use crate::config::OdooSettings;

const JSONRPC_PATH: &str = "/jsonrpc";

/// Config parameters surfaced by `server_info`.
const SERVER_INFO_PARAMETERS: [&str; 2] = ["database.expiration_date", "database.enterprise_code"];

/// Maximum number of installed modules listed by `server_info`.
const SERVER_INFO_MODULES_LIMIT: u64 = 50;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: JsonRpcParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct JsonRpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Vec<Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcFault>,
}

#[derive(Deserialize)]
struct JsonRpcFault {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<JsonRpcFaultData>,
}

#[derive(Deserialize)]
struct JsonRpcFaultData {
    #[serde(default)]
    message: Option<String>,
}

impl From<JsonRpcFault> for RemoteError {
    fn from(fault: JsonRpcFault) -> Self {
        // Odoo puts the user-facing message in `data.message`; the top-level
        // message is a generic "Odoo Server Error".
        let message = fault
            .data
            .and_then(|data| data.message)
            .filter(|message| !message.is_empty())
            .unwrap_or(fault.message);
        RemoteError::Fault {
            code: fault.code,
            message,
        }
    }
}

/// Odoo client authenticating lazily on the first model call.
pub struct OdooClient {
    client: reqwest::Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
    uid: OnceCell<i64>,
    next_request_id: AtomicU64,
}

impl OdooClient {
    /// Create a new client from the resolved Odoo settings.
    pub fn new(settings: &OdooSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            database: settings.database.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            uid: OnceCell::new(),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Base URL of the Odoo server, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Server version information (`common.version`), no authentication needed.
    pub async fn version(&self) -> Result<Value, RemoteError> {
        self.rpc("common", "version", Vec::new()).await
    }

    /// Authenticated user id, authenticating on first use.
    pub async fn uid(&self) -> Result<i64, RemoteError> {
        self.uid
            .get_or_try_init(|| self.authenticate())
            .await
            .copied()
    }

    async fn authenticate(&self) -> Result<i64, RemoteError> {
        let result = self
            .rpc(
                "common",
                "authenticate",
                vec![
                    json!(self.database),
                    json!(self.username),
                    json!(self.password),
                    json!({}),
                ],
            )
            .await?;

        // Odoo answers `false` on bad credentials.
        match result.as_i64() {
            Some(uid) if uid > 0 => {
                info!(
                    "Authenticated to Odoo at {} as {} (uid {})",
                    self.base_url, self.username, uid
                );
                Ok(uid)
            }
            _ => {
                error!("Odoo authentication failed for user {}", self.username);
                Err(RemoteError::Authentication(self.username.clone()))
            }
        }
    }

    /// `object.execute_kw` on behalf of the authenticated user.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        let uid = self.uid().await?;

        debug!(model = %model, method = %method, "Calling Odoo execute_kw");

        let result = self
            .rpc(
                "object",
                "execute_kw",
                vec![
                    json!(self.database),
                    json!(uid),
                    json!(self.password),
                    json!(model),
                    json!(method),
                    Value::Array(args),
                    Value::Object(kwargs),
                ],
            )
            .await;

        if let Err(e) = &result {
            error!("Call failed for {}.{}: {}", model, method, e);
        }
        result
    }

    async fn rpc(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, JSONRPC_PATH);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: JsonRpcParams {
                service,
                method,
                args,
            },
            id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout
                } else {
                    RemoteError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            RemoteError::InvalidResponse(format!("Failed to parse JSON-RPC response: {}", e))
        })?;

        match body.error {
            Some(fault) => Err(fault.into()),
            None => Ok(body.result.unwrap_or(Value::Null)),
        }
    }
}

fn ids_value(ids: &[i64]) -> Value {
    Value::from(ids.to_vec())
}

#[async_trait]
impl OdooRemote for OdooClient {
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        options: SearchOptions,
    ) -> Result<Vec<Value>, RemoteError> {
        let result = self
            .execute_kw(model, "search_read", vec![domain], options.to_kwargs())
            .await?;
        match result {
            Value::Array(records) => Ok(records),
            other => Err(RemoteError::InvalidResponse(format!(
                "search_read returned a non-list value: {}",
                other
            ))),
        }
    }

    async fn create(&self, model: &str, values: Map<String, Value>) -> Result<Value, RemoteError> {
        self.execute_kw(model, "create", vec![Value::Object(values)], Map::new())
            .await
    }

    async fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        self.execute_kw(
            model,
            "write",
            vec![ids_value(ids), Value::Object(values)],
            Map::new(),
        )
        .await
    }

    async fn unlink(&self, model: &str, ids: &[i64]) -> Result<Value, RemoteError> {
        self.execute_kw(model, "unlink", vec![ids_value(ids)], Map::new())
            .await
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        self.execute_kw(model, method, args, kwargs).await
    }

    async fn fields_get(&self, model: &str, fields: &[String]) -> Result<Value, RemoteError> {
        let args = if fields.is_empty() {
            Vec::new()
        } else {
            vec![Value::from(fields.to_vec())]
        };
        self.execute_kw(model, "fields_get", args, Map::new()).await
    }

    async fn report(&self, report_name: &str, record_ids: &[i64]) -> Result<Value, RemoteError> {
        let mut kwargs = Map::new();
        kwargs.insert("data".to_string(), json!({ "form": {} }));
        self.execute_kw(
            "ir.actions.report",
            "_render",
            vec![json!(report_name), ids_value(record_ids)],
            kwargs,
        )
        .await
    }

    async fn server_info(&self) -> Result<Value, RemoteError> {
        let uid = self.uid().await?;

        let parameters = self
            .search_read(
                "ir.config_parameter",
                json!([["key", "in", SERVER_INFO_PARAMETERS]]),
                SearchOptions {
                    fields: vec!["key".to_string(), "value".to_string()],
                    ..Default::default()
                },
            )
            .await?;

        let modules = self
            .search_read(
                "ir.module.module",
                json!([["state", "=", "installed"]]),
                SearchOptions {
                    fields: ["name", "shortdesc", "author", "version"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    limit: Some(SERVER_INFO_MODULES_LIMIT),
                    ..Default::default()
                },
            )
            .await?;

        Ok(json!({
            "database": self.database,
            "url": self.base_url,
            "user_id": uid,
            "database_info": parameters,
            "installed_modules": modules,
        }))
    }
}

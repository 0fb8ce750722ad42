//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per gateway endpoint.

use super::constants::*;
use odoo_mcp_gateway::server::API_KEY_HEADER;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
    api_key: Option<String>,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            api_key: None,
        }
    }

    /// Client sending `key` in the `X-API-Key` header on every request
    pub fn with_api_key(base_url: String, key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Self::new(base_url)
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.authorize(self.client.get(self.url(path)))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.authorize(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // MCP endpoints
    // ========================================================================

    pub async fn initialize(&self) -> Response {
        self.post("/mcp/initialize", &json!({})).await
    }

    pub async fn tools_list(&self) -> Response {
        self.post("/mcp/tools/list", &json!({})).await
    }

    pub async fn call_tool(&self, tool: &str, params: Value) -> Response {
        self.post(
            "/mcp/tools/call",
            &json!({ "method": tool, "params": params, "id": 1 }),
        )
        .await
    }

    pub async fn stream_tool(&self, tool: &str, params: Value) -> Response {
        self.post(
            "/mcp/stream/tools/call",
            &json!({ "method": tool, "params": params }),
        )
        .await
    }

    pub async fn mode(&self) -> Response {
        self.get("/mcp/mode").await
    }

    pub async fn resources_list(&self) -> Response {
        self.post("/mcp/resources/list", &json!({})).await
    }

    pub async fn read_resource(&self, uri: &str) -> Response {
        self.post(
            "/mcp/resources/read",
            &json!({ "params": { "uri": uri }, "id": "r1" }),
        )
        .await
    }
}

/// Parses every `data:` line of a Server-Sent-Events body as JSON
pub fn parse_sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("SSE data is not JSON"))
        .collect()
}

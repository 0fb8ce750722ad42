//! End-to-end tests for API key, client address and rate limit enforcement

mod common;

use common::{test_config, FakeOdoo, TestClient, TestServer, TEST_API_KEY};
use odoo_mcp_gateway::{McpMode, ServerConfig};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_api_key_is_required_except_for_health() {
    let server = TestServer::spawn_with_api_key().await;
    let anonymous = TestClient::new(server.base_url.clone());

    assert_eq!(anonymous.get("/health").await.status(), StatusCode::OK);

    let response = anonymous.mode().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let denied = anonymous
        .call_tool("odoo_search", json!({"model": "res.partner"}))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.odoo.call_count(), 0);
}

#[tokio::test]
async fn test_api_key_header_and_bearer_token() {
    let server = TestServer::spawn_with_api_key().await;

    let with_header = TestClient::with_api_key(server.base_url.clone(), TEST_API_KEY);
    assert_eq!(with_header.mode().await.status(), StatusCode::OK);

    let bearer = TestClient::new(server.base_url.clone());
    let response = bearer
        .client
        .get(format!("{}/mcp/mode", server.base_url))
        .bearer_auth(TEST_API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let wrong = TestClient::with_api_key(server.base_url.clone(), "wrong-key");
    assert_eq!(wrong.mode().await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_allowed_ips_reject_other_clients() {
    let config = ServerConfig {
        allowed_ips: vec!["10.1.2.3".parse().unwrap()],
        ..test_config(McpMode::Readonly)
    };
    let server = TestServer::spawn_with(config, FakeOdoo::seeded()).await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(client.get("/health").await.status(), StatusCode::OK);
    assert_eq!(client.mode().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_loopback_in_allowed_ips_is_admitted() {
    let config = ServerConfig {
        allowed_ips: vec!["127.0.0.1".parse().unwrap()],
        ..test_config(McpMode::Readonly)
    };
    let server = TestServer::spawn_with(config, FakeOdoo::seeded()).await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(client.mode().await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() {
    let config = ServerConfig {
        rate_limit_requests: 3,
        rate_limit_window: Duration::from_secs(60),
        ..test_config(McpMode::Readonly)
    };
    let server = TestServer::spawn_with(config, FakeOdoo::seeded()).await;
    let client = TestClient::new(server.base_url.clone());

    for _ in 0..3 {
        assert_eq!(client.mode().await.status(), StatusCode::OK);
    }
    let limited = client.mode().await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = limited
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header missing");
    assert!((1..=60).contains(&retry_after));

    // Liveness is never throttled.
    assert_eq!(client.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_for_configured_origin() {
    let config = ServerConfig {
        cors_origins: vec!["https://app.example".to_string()],
        ..test_config(McpMode::Readonly)
    };
    let server = TestServer::spawn_with(config, FakeOdoo::seeded()).await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/mcp/tools/call", server.base_url),
        )
        .header(reqwest::header::ORIGIN, "https://app.example")
        .header(reqwest::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example")
    );
}

#[tokio::test]
async fn test_metrics_count_tool_calls() {
    odoo_mcp_gateway::server::metrics::init_metrics();
    let server = TestServer::spawn(McpMode::Readonly).await;
    let client = TestClient::new(server.base_url.clone());

    client
        .call_tool("odoo_create", json!({"model": "res.partner", "values": {}}))
        .await;
    let response = client.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = response.text().await.unwrap();
    assert!(text.contains("odoo_mcp_tool_calls_total"));
    assert!(text.contains("odoo_mcp_permission_denials_total"));
}

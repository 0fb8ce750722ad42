use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all gateway metrics
const PREFIX: &str = "odoo_mcp";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Tool Metrics
    pub static ref TOOL_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tool_calls_total"), "Tool invocations by outcome"),
        &["tool", "outcome"]
    ).expect("Failed to create tool_calls_total metric");

    pub static ref TOOL_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_tool_call_duration_seconds"),
            "Duration of forwarded tool calls in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["tool"]
    ).expect("Failed to create tool_call_duration_seconds metric");

    pub static ref PERMISSION_DENIALS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_permission_denials_total"), "Calls rejected by the mode policy"),
        &["tool", "mode"]
    ).expect("Failed to create permission_denials_total metric");

    // Streaming Metrics
    pub static ref STREAM_CHUNKS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_stream_chunks_total"),
        "Record chunks emitted on streaming responses"
    ).expect("Failed to create stream_chunks_total metric");

    // Rate Limiting Metrics
    pub static ref RATE_LIMIT_HITS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_rate_limit_hits_total"), "Rate limit violations"),
        &["path"]
    ).expect("Failed to create rate_limit_hits_total metric");

    // WebSocket Metrics
    pub static ref WS_ACTIVE_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_ws_active_connections"),
        "Number of open MCP WebSocket connections"
    ).expect("Failed to create ws_active_connections metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TOOL_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TOOL_CALL_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PERMISSION_DENIALS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STREAM_CHUNKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RATE_LIMIT_HITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_ACTIVE_CONNECTIONS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of a tool invocation
pub fn record_tool_call(tool: &str, outcome: &str, duration: Duration) {
    TOOL_CALLS_TOTAL.with_label_values(&[tool, outcome]).inc();

    TOOL_CALL_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(duration.as_secs_f64());
}

pub fn record_permission_denial(tool: &str, mode: &str) {
    PERMISSION_DENIALS_TOTAL
        .with_label_values(&[tool, mode])
        .inc();
}

pub fn record_stream_chunk() {
    STREAM_CHUNKS_TOTAL.inc();
}

/// Record a rate limit hit
pub fn record_rate_limit_hit(path: &str) {
    RATE_LIMIT_HITS_TOTAL.with_label_values(&[path]).inc();
}

pub fn ws_connection_opened() {
    WS_ACTIVE_CONNECTIONS.inc();
}

pub fn ws_connection_closed() {
    WS_ACTIVE_CONNECTIONS.dec();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

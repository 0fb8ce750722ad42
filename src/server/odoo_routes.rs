//! Direct Odoo endpoints under `/odoo`.
//!
//! Thin wrappers over the dispatcher, so the mode policy applies here too.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::mcp_routes::{decode_body, dispatch_error_response};
use super::state::{GuardedDispatcher, ServerState};
use crate::mcp::OdooTool;

#[derive(Debug, Deserialize)]
struct QueryBody {
    model: String,
    method: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    kwargs: Map<String, Value>,
}

/// Arbitrary model method, policy-checked as `odoo_call`.
async fn query(
    State(dispatcher): State<GuardedDispatcher>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body: QueryBody = match decode_body(body) {
        Ok((body, _)) => body,
        Err(response) => return response,
    };
    let params = json!({
        "model": body.model,
        "method": body.method,
        "args": body.args,
        "kwargs": body.kwargs,
    });
    match dispatcher.invoke(OdooTool::Call.name(), params).await {
        Ok(envelope) => Json(envelope).into_response(),
        Err(e) => dispatch_error_response(e, None),
    }
}

async fn list_models(State(dispatcher): State<GuardedDispatcher>) -> Response {
    // limit 0 lifts Odoo's default page size
    let params = json!({
        "model": "ir.model",
        "domain": [["transient", "=", false]],
        "fields": ["model", "name", "info"],
        "limit": 0,
    });
    match dispatcher.invoke(OdooTool::Search.name(), params).await {
        Ok(envelope) => {
            let records = envelope
                .result
                .and_then(|mut result| result.get_mut("records").map(Value::take))
                .unwrap_or_else(|| json!([]));
            Json(json!({ "models": records })).into_response()
        }
        Err(e) => dispatch_error_response(e, None),
    }
}

async fn model_fields(
    State(dispatcher): State<GuardedDispatcher>,
    Path(model): Path<String>,
) -> Response {
    match dispatcher
        .invoke(OdooTool::FieldsGet.name(), json!({ "model": model }))
        .await
    {
        Ok(envelope) => Json(envelope).into_response(),
        Err(e) => dispatch_error_response(e, None),
    }
}

pub fn make_odoo_routes() -> Router<ServerState> {
    Router::new()
        .route("/odoo/query", post(query))
        .route("/odoo/models", get(list_models))
        .route("/odoo/models/{model}/fields", get(model_fields))
}

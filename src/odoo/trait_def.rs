//! OdooRemote trait definition.
//!
//! This trait abstracts the remote procedure calls the gateway forwards to an
//! Odoo server, so the dispatcher can be exercised against test doubles.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by the remote side or by the transport talking to it.
///
/// `Fault` carries the message reported by Odoo verbatim.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed for user {0}")]
    Authentication(String),

    #[error("{message}")]
    Fault { code: i64, message: String },

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Options forwarded to `search_read`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub fields: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<String>,
}

impl SearchOptions {
    /// Keyword arguments in the shape `execute_kw` expects.
    pub fn to_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), Value::from(self.fields.clone()));
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), Value::from(limit));
        }
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), Value::from(offset));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), Value::from(order.clone()));
        }
        kwargs
    }
}

/// Remote procedure client for an Odoo server.
///
/// Payloads are opaque JSON: the gateway never interprets business records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OdooRemote: Send + Sync {
    // =========================================================================
    // Record operations
    // =========================================================================

    /// Search records matching `domain` and read their fields.
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        options: SearchOptions,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Create one record, returning the new record id.
    async fn create(&self, model: &str, values: Map<String, Value>) -> Result<Value, RemoteError>;

    /// Update the given records.
    async fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: Map<String, Value>,
    ) -> Result<Value, RemoteError>;

    /// Delete the given records.
    async fn unlink(&self, model: &str, ids: &[i64]) -> Result<Value, RemoteError>;

    /// Call an arbitrary model method.
    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, RemoteError>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Field definitions of a model, optionally restricted to `fields`.
    async fn fields_get(&self, model: &str, fields: &[String]) -> Result<Value, RemoteError>;

    /// Render a report for the given records.
    async fn report(&self, report_name: &str, record_ids: &[i64]) -> Result<Value, RemoteError>;

    /// Database, user and installed module summary of the remote server.
    async fn server_info(&self) -> Result<Value, RemoteError>;
}

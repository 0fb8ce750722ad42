//! Closed tool catalog and typed tool parameters.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;

use super::mode::PermissionLevel;
use super::protocol::ToolDefinition;

/// Default `limit` of `odoo_search`.
pub const DEFAULT_SEARCH_LIMIT: u64 = 100;

/// Default `format` of `odoo_report`.
pub const DEFAULT_REPORT_FORMAT: &str = "pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdooTool {
    Search,
    Create,
    Write,
    Unlink,
    Call,
    FieldsGet,
    Report,
}

impl OdooTool {
    pub const ALL: [OdooTool; 7] = [
        OdooTool::Search,
        OdooTool::Create,
        OdooTool::Write,
        OdooTool::Unlink,
        OdooTool::Call,
        OdooTool::FieldsGet,
        OdooTool::Report,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OdooTool::Search => "odoo_search",
            OdooTool::Create => "odoo_create",
            OdooTool::Write => "odoo_write",
            OdooTool::Unlink => "odoo_unlink",
            OdooTool::Call => "odoo_call",
            OdooTool::FieldsGet => "odoo_fields_get",
            OdooTool::Report => "odoo_report",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OdooTool::Search => "Search for records in Odoo models",
            OdooTool::Create => "Create a new record in Odoo",
            OdooTool::Write => "Update existing records in Odoo",
            OdooTool::Unlink => "Delete records from Odoo",
            OdooTool::Call => "Call a method on an Odoo model",
            OdooTool::FieldsGet => "Get field definitions for an Odoo model",
            OdooTool::Report => "Generate reports from Odoo",
        }
    }

    /// Parameters that must be present and non-null.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            OdooTool::Search | OdooTool::FieldsGet => &["model"],
            OdooTool::Create => &["model", "values"],
            OdooTool::Write | OdooTool::Unlink => &["model", "ids"],
            OdooTool::Call => &["model", "method"],
            OdooTool::Report => &["report_name", "record_ids"],
        }
    }

    pub fn required_permissions(&self) -> &'static [PermissionLevel] {
        match self {
            OdooTool::Search | OdooTool::FieldsGet => &[PermissionLevel::Read],
            OdooTool::Create | OdooTool::Write => &[PermissionLevel::Write],
            OdooTool::Unlink => &[PermissionLevel::Delete],
            OdooTool::Call | OdooTool::Report => {
                &[PermissionLevel::Read, PermissionLevel::Execute]
            }
        }
    }

    pub fn input_schema(&self) -> Value {
        let model = json!({"type": "string", "description": "Odoo model name (e.g. 'res.partner')"});
        let properties = match self {
            OdooTool::Search => json!({
                "model": model,
                "domain": {"type": "array", "description": "Search domain filters"},
                "fields": {"type": "array", "items": {"type": "string"}, "description": "Fields to retrieve"},
                "limit": {"type": "integer", "description": "Maximum number of records", "default": DEFAULT_SEARCH_LIMIT},
                "offset": {"type": "integer", "description": "Number of records to skip"},
                "order": {"type": "string", "description": "Sort specification (e.g. 'name asc')"}
            }),
            OdooTool::Create => json!({
                "model": model,
                "values": {"type": "object", "description": "Field values for the new record"}
            }),
            OdooTool::Write => json!({
                "model": model,
                "ids": {"type": "array", "items": {"type": "integer"}, "description": "Record IDs to update"},
                "values": {"type": "object", "description": "Field values to update"}
            }),
            OdooTool::Unlink => json!({
                "model": model,
                "ids": {"type": "array", "items": {"type": "integer"}, "description": "Record IDs to delete"}
            }),
            OdooTool::Call => json!({
                "model": model,
                "method": {"type": "string", "description": "Method name to call"},
                "args": {"type": "array", "description": "Positional arguments"},
                "kwargs": {"type": "object", "description": "Keyword arguments"}
            }),
            OdooTool::FieldsGet => json!({
                "model": model,
                "fields": {"type": "array", "items": {"type": "string"}, "description": "Specific fields to describe (optional)"}
            }),
            OdooTool::Report => json!({
                "report_name": {"type": "string", "description": "Report template name"},
                "record_ids": {"type": "array", "items": {"type": "integer"}, "description": "Record IDs for the report"},
                "format": {"type": "string", "description": "Output format (pdf, html, ...)", "default": DEFAULT_REPORT_FORMAT}
            }),
        };

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_params(),
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        Self::ALL.iter().map(|tool| tool.definition()).collect()
    }
}

impl FromStr for OdooTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

// ============================================================================
// Typed parameters
// ============================================================================

fn empty_domain() -> Value {
    json!([])
}

fn default_search_limit() -> u64 {
    DEFAULT_SEARCH_LIMIT
}

fn default_report_format() -> String {
    DEFAULT_REPORT_FORMAT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub model: String,
    #[serde(default = "empty_domain")]
    pub domain: Value,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParams {
    pub model: String,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteParams {
    pub model: String,
    pub ids: Vec<i64>,
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlinkParams {
    pub model: String,
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallParams {
    pub model: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldsGetParams {
    pub model: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportParams {
    pub report_name: String,
    pub record_ids: Vec<i64>,
    #[serde(default = "default_report_format")]
    pub format: String,
}

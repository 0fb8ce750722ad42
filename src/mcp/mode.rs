//! Mode Policy
//!
//! Decides which tools (and, for `odoo_call`, which remote methods) may run
//! under the configured [`McpMode`]. Everything here is pure and synchronous.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::tools::OdooTool;

/// Process-wide permission mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpMode {
    #[default]
    Readonly,
    Readwrite,
}

impl McpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            McpMode::Readonly => "readonly",
            McpMode::Readwrite => "readwrite",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            McpMode::Readonly => {
                "Read-only mode: only read and lookup operations are allowed"
            }
            McpMode::Readwrite => "Read-write mode: all operations are allowed",
        }
    }

    pub fn allowed_permissions(&self) -> &'static [PermissionLevel] {
        match self {
            McpMode::Readonly => &[PermissionLevel::Read, PermissionLevel::Execute],
            McpMode::Readwrite => &PermissionLevel::ALL,
        }
    }

    pub fn forbidden_permissions(&self) -> &'static [PermissionLevel] {
        match self {
            McpMode::Readonly => &[PermissionLevel::Write, PermissionLevel::Delete],
            McpMode::Readwrite => &[],
        }
    }
}

impl fmt::Display for McpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for McpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "readonly" => Ok(McpMode::Readonly),
            "readwrite" => Ok(McpMode::Readwrite),
            other => Err(format!(
                "Invalid MCP mode '{}', expected 'readonly' or 'readwrite'",
                other
            )),
        }
    }
}

/// Kind of access a tool needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Write,
    Delete,
    Execute,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 4] = [
        PermissionLevel::Read,
        PermissionLevel::Write,
        PermissionLevel::Delete,
        PermissionLevel::Execute,
    ];
}

/// Remote method names considered mutating when reached through `odoo_call`.
pub const WRITE_METHODS: [&str; 12] = [
    "create",
    "write",
    "unlink",
    "copy",
    "toggle_active",
    "action_confirm",
    "action_cancel",
    "action_done",
    "button_confirm",
    "button_cancel",
    "post",
    "reconcile",
];

/// Exact, case-insensitive membership in [`WRITE_METHODS`], ignoring surrounding whitespace.
pub fn is_write_method(method: &str) -> bool {
    let method = method.trim().to_ascii_lowercase();
    WRITE_METHODS.contains(&method.as_str())
}

/// Whether the tool itself is usable under `mode`, ignoring any method.
pub fn is_tool_allowed(mode: McpMode, tool: OdooTool) -> bool {
    let forbidden = mode.forbidden_permissions();
    tool.required_permissions()
        .iter()
        .all(|level| !forbidden.contains(level))
}

/// Full policy decision.
///
/// Under `readonly`, `odoo_call` is additionally checked against
/// [`WRITE_METHODS`]. Methods outside that list pass: the policy blocks known
/// writes rather than allowing known reads.
pub fn is_allowed(mode: McpMode, tool: OdooTool, method: Option<&str>) -> bool {
    if mode == McpMode::Readwrite {
        return true;
    }
    if !is_tool_allowed(mode, tool) {
        return false;
    }
    match (tool, method) {
        (OdooTool::Call, Some(method)) => !is_write_method(method),
        _ => true,
    }
}

/// Tools usable under `mode`, in catalog order.
pub fn allowed_tools(mode: McpMode) -> Vec<OdooTool> {
    OdooTool::ALL
        .iter()
        .copied()
        .filter(|tool| is_tool_allowed(mode, *tool))
        .collect()
}

/// Body of `GET /mcp/mode`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeInfo {
    pub mode: McpMode,
    pub allowed_permissions: Vec<PermissionLevel>,
    pub forbidden_permissions: Vec<PermissionLevel>,
    pub allowed_tools: Vec<&'static str>,
    pub description: &'static str,
}

/// Mode summary embedded in the `initialize` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeDescriptor {
    pub mode: McpMode,
    pub allowed_tools: Vec<&'static str>,
    pub description: &'static str,
}

pub fn mode_info(mode: McpMode) -> ModeInfo {
    ModeInfo {
        mode,
        allowed_permissions: mode.allowed_permissions().to_vec(),
        forbidden_permissions: mode.forbidden_permissions().to_vec(),
        allowed_tools: allowed_tools(mode).iter().map(|t| t.name()).collect(),
        description: mode.description(),
    }
}

pub fn mode_descriptor(mode: McpMode) -> ModeDescriptor {
    ModeDescriptor {
        mode,
        allowed_tools: allowed_tools(mode).iter().map(|t| t.name()).collect(),
        description: mode.description(),
    }
}

//! Fixed resource catalog.
//!
//! Resources are plain reads against the remote server and are available in
//! every mode.

use serde_json::{json, Value};

use super::dispatcher::DispatchError;
use super::protocol::{ResourceContent, ResourceDefinition, ResourcesReadResult};
use crate::odoo::{OdooRemote, SearchOptions};

const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdooResource {
    Models,
    Users,
    Companies,
    Config,
}

impl OdooResource {
    pub const ALL: [OdooResource; 4] = [
        OdooResource::Models,
        OdooResource::Users,
        OdooResource::Companies,
        OdooResource::Config,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            OdooResource::Models => "odoo://models",
            OdooResource::Users => "odoo://users",
            OdooResource::Companies => "odoo://companies",
            OdooResource::Config => "odoo://config",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.uri() == uri)
    }

    fn name(&self) -> &'static str {
        match self {
            OdooResource::Models => "Odoo Models",
            OdooResource::Users => "Odoo Users",
            OdooResource::Companies => "Odoo Companies",
            OdooResource::Config => "Odoo Configuration",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            OdooResource::Models => "List of all available Odoo models",
            OdooResource::Users => "List of Odoo users",
            OdooResource::Companies => "List of companies in Odoo",
            OdooResource::Config => "Odoo server configuration and settings",
        }
    }

    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: self.uri().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            mime_type: JSON_MIME_TYPE.to_string(),
        }
    }

    pub fn definitions() -> Vec<ResourceDefinition> {
        Self::ALL.iter().map(|r| r.definition()).collect()
    }
}

fn fields(names: &[&str]) -> SearchOptions {
    SearchOptions {
        fields: names.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

/// Fetch a resource and wrap it as JSON text content.
pub async fn read_resource(
    remote: &dyn OdooRemote,
    uri: &str,
) -> Result<ResourcesReadResult, DispatchError> {
    let resource =
        OdooResource::from_uri(uri).ok_or_else(|| DispatchError::UnknownResource(uri.to_string()))?;

    let payload: Value = match resource {
        OdooResource::Models => Value::from(
            remote
                .search_read(
                    "ir.model",
                    json!([["transient", "=", false]]),
                    fields(&["model", "name", "info"]),
                )
                .await?,
        ),
        OdooResource::Users => Value::from(
            remote
                .search_read("res.users", json!([]), fields(&["name", "login", "email"]))
                .await?,
        ),
        OdooResource::Companies => Value::from(
            remote
                .search_read("res.company", json!([]), fields(&["name", "email", "website"]))
                .await?,
        ),
        OdooResource::Config => remote.server_info().await?,
    };

    Ok(ResourcesReadResult {
        contents: vec![ResourceContent {
            uri: resource.uri().to_string(),
            mime_type: JSON_MIME_TYPE.to_string(),
            text: payload.to_string(),
        }],
    })
}

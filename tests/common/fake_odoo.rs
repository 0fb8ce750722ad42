//! In-memory stand-in for an Odoo server
//!
//! Keeps records per model and remembers every remote operation, so tests can
//! assert that denied invocations never reached the remote side.

use super::constants::*;
use async_trait::async_trait;
use odoo_mcp_gateway::odoo::{OdooRemote, RemoteError, SearchOptions};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One operation received by the fake
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub model: String,
    pub method: Option<String>,
}

#[derive(Default)]
struct Inner {
    models: BTreeMap<String, Vec<Value>>,
    next_id: i64,
    calls: Vec<RecordedCall>,
    failure: Option<String>,
}

pub struct FakeOdoo {
    inner: Mutex<Inner>,
}

impl FakeOdoo {
    /// Empty database
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Database seeded with `PARTNER_COUNT` partners, users, companies and models
    pub fn seeded() -> Self {
        let fake = Self::new();
        for i in 1..=PARTNER_COUNT {
            fake.insert(
                "res.partner",
                json!({ "name": format!("Partner {}", i), "email": format!("p{}@example.com", i) }),
            );
        }
        fake.insert(
            "res.users",
            json!({ "name": "Administrator", "login": "admin", "email": "admin@example.com" }),
        );
        fake.insert(
            "res.company",
            json!({ "name": "My Company", "email": "info@example.com", "website": "https://example.com" }),
        );
        for model in SEEDED_MODELS {
            fake.insert(
                "ir.model",
                json!({ "model": model, "name": model, "info": "", "transient": false }),
            );
        }
        // Seeding is not a remote call.
        fake.inner.lock().unwrap().calls.clear();
        fake
    }

    /// Every subsequent remote operation fails with this Odoo fault message
    pub fn fail_with(&self, message: &str) {
        self.inner.lock().unwrap().failure = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    pub fn records(&self, model: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .models
            .get(model)
            .cloned()
            .unwrap_or_default()
    }

    fn insert(&self, model: &str, mut values: Value) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        values["id"] = json!(id);
        inner
            .models
            .entry(model.to_string())
            .or_default()
            .push(values);
        id
    }

    fn record(
        &self,
        operation: &'static str,
        model: &str,
        method: Option<&str>,
    ) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            operation,
            model: model.to_string(),
            method: method.map(str::to_string),
        });
        match &inner.failure {
            Some(message) => Err(RemoteError::Fault {
                code: 200,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn project(record: &Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return record.clone();
    }
    let mut out = Map::new();
    out.insert("id".to_string(), record["id"].clone());
    for field in fields {
        if let Some(value) = record.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Value::Object(out)
}

#[async_trait]
impl OdooRemote for FakeOdoo {
    async fn search_read(
        &self,
        model: &str,
        _domain: Value,
        options: SearchOptions,
    ) -> Result<Vec<Value>, RemoteError> {
        self.record("search_read", model, None)?;
        let offset = options.offset.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(limit) => limit as usize,
        };
        Ok(self
            .records(model)
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| project(record, &options.fields))
            .collect())
    }

    async fn create(&self, model: &str, values: Map<String, Value>) -> Result<Value, RemoteError> {
        self.record("create", model, None)?;
        Ok(json!(self.insert(model, Value::Object(values))))
    }

    async fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        self.record("write", model, None)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(records) = inner.models.get_mut(model) {
            for record in records
                .iter_mut()
                .filter(|r| ids.contains(&r["id"].as_i64().unwrap_or_default()))
            {
                for (key, value) in &values {
                    record[key] = value.clone();
                }
            }
        }
        Ok(json!(true))
    }

    async fn unlink(&self, model: &str, ids: &[i64]) -> Result<Value, RemoteError> {
        self.record("unlink", model, None)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(records) = inner.models.get_mut(model) {
            records.retain(|r| !ids.contains(&r["id"].as_i64().unwrap_or_default()));
        }
        Ok(json!(true))
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        _kwargs: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        self.record("call", model, Some(method))?;
        match method {
            "name_get" => {
                let ids: Vec<i64> = args
                    .first()
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let names: Vec<Value> = self
                    .records(model)
                    .iter()
                    .filter(|r| ids.contains(&r["id"].as_i64().unwrap_or_default()))
                    .map(|r| json!([r["id"], r["name"]]))
                    .collect();
                Ok(Value::Array(names))
            }
            "search_count" => Ok(json!(self.records(model).len())),
            _ => Ok(json!(true)),
        }
    }

    async fn fields_get(&self, model: &str, fields: &[String]) -> Result<Value, RemoteError> {
        self.record("fields_get", model, None)?;
        let all = json!({
            "name": { "type": "char", "string": "Name" },
            "email": { "type": "char", "string": "Email" },
        });
        if fields.is_empty() {
            return Ok(all);
        }
        let selected: Map<String, Value> = fields
            .iter()
            .filter_map(|f| all.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        Ok(Value::Object(selected))
    }

    async fn report(&self, report_name: &str, record_ids: &[i64]) -> Result<Value, RemoteError> {
        self.record("report", report_name, None)?;
        Ok(json!([format!("%PDF-{}-{}", report_name, record_ids.len()), "pdf"]))
    }

    async fn server_info(&self) -> Result<Value, RemoteError> {
        self.record("server_info", "ir.config_parameter", None)?;
        Ok(json!({
            "database": "odoo",
            "url": "http://fake-odoo",
            "user_id": 2,
            "database_info": {},
            "installed_modules": ["base", "contacts"],
        }))
    }
}

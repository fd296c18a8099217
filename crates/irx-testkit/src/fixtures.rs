use std::sync::Arc;

use anyhow::{bail, Result};
use irx_reconcile::{Batch, Record};
use irx_schemas::SchemaRegistry;
use serde_json::{json, Value};

/// The registry shipped in `config/entities.yaml`.
pub fn default_registry() -> Result<Arc<SchemaRegistry>> {
    Ok(Arc::new(irx_config::default_registry()?.registry))
}

/// Unwrap a JSON object literal into a record.
pub fn record(v: Value) -> Result<Record> {
    match v {
        Value::Object(m) => Ok(m),
        other => bail!("record fixture must be a JSON object, got {other}"),
    }
}

/// Unwrap a JSON object literal into a batch.
pub fn batch(v: Value) -> Result<Batch> {
    record(v)
}

/// A complete `unit_test_records` candidate for artifact `name` at `version`.
pub fn unit_test_record(name: &str, version: &str, coverage: f64) -> Result<Record> {
    record(json!({
        "artifact_url": format!("https://artifacts.example/{name}"),
        "artifact_name": name,
        "artifact_version": version,
        "coverage": coverage,
        "passed": 12,
        "failed": 0,
        "artifact_info": {"build": "b-101", "runner": "ci"},
    }))
}

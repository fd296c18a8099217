//! irx-config
//!
//! Layered YAML loading of the entity registry.
//!
//! Files are merged in order (earlier = base, later = override), the merged
//! document is canonicalized and hashed so a reconciliation run can be tied
//! to the exact registry it used, and the result is turned into an immutable
//! [`SchemaRegistry`].

use anyhow::{Context, Result};
use irx_schemas::{EntitySchema, SchemaRegistry};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;

/// Registry shipped with the workspace (`config/entities.yaml`).
pub const DEFAULT_ENTITIES_YAML: &str = include_str!("../../../config/entities.yaml");

#[derive(Debug, Clone)]
pub struct LoadedRegistry {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub registry: SchemaRegistry,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDoc {
    #[serde(default)]
    entities: BTreeMap<String, EntityDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDef {
    unique_keys: Vec<String>,
    #[serde(default, alias = "excluded_columns")]
    excluded_fields: Vec<String>,
    #[serde(default, alias = "json_columns")]
    structured_fields: Vec<String>,
}

/// Load and merge registry files in order.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedRegistry> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedRegistry> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses to null; it contributes nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    let registry = registry_from_json(&merged)?;
    let canonical_json = irx_schemas::canonical_json(&merged);
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedRegistry {
        config_hash,
        canonical_json,
        config_json: merged,
        registry,
    })
}

/// The registry shipped in `config/entities.yaml`.
pub fn default_registry() -> Result<LoadedRegistry> {
    load_layered_yaml_from_strings(&[DEFAULT_ENTITIES_YAML]).context("bundled entity registry")
}

/// Convert a merged config document into a validated registry.
pub fn registry_from_json(config_json: &Value) -> Result<SchemaRegistry> {
    let doc: RegistryDoc =
        serde_json::from_value(config_json.clone()).context("invalid registry document")?;

    let mut schemas = Vec::with_capacity(doc.entities.len());
    for (name, def) in doc.entities {
        let schema = EntitySchema::new(
            &def.unique_keys,
            &def.excluded_fields,
            &def.structured_fields,
        )
        .with_context(|| format!("invalid schema for entity type '{name}'"))?;
        schemas.push((name, schema));
    }

    SchemaRegistry::new(schemas).context("invalid entity registry")
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

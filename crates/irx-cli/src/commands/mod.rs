//! Command handler modules for irx-cli.
//!
//! Shared loading helpers live here; the reconcile run lives in its submodule.

pub mod reconcile;

use anyhow::{bail, Context, Result};
use irx_config::LoadedRegistry;
use irx_reconcile::Batch;
use serde_json::Value;
use std::fs;

/// Layered registry from `paths`, or the built-in registry when none are given.
pub fn load_registry(paths: &[String]) -> Result<LoadedRegistry> {
    if paths.is_empty() {
        return irx_config::default_registry();
    }
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    irx_config::load_layered_yaml(&refs)
}

/// Read a batch file. The root must be a JSON object.
pub fn load_batch(path: &str) -> Result<Batch> {
    let bytes = fs::read(path).with_context(|| format!("read input file failed: {path}"))?;
    parse_batch(&bytes).with_context(|| format!("invalid batch file: {path}"))
}

fn parse_batch(bytes: &[u8]) -> Result<Batch> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    let raw = std::str::from_utf8(bytes).context("input file must be UTF-8 text")?;
    let v: Value = serde_json::from_str(raw.trim()).context("input file must contain valid JSON")?;
    match v {
        Value::Object(batch) => Ok(batch),
        _ => bail!("batch root must be a JSON object mapping entity type to a list of records"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_root_and_strips_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#" {"jira_issues": [{"jira_key": "QA-1"}]} "#);
        let b = parse_batch(&bytes).unwrap();
        assert_eq!(b.len(), 1);
        assert!(b["jira_issues"].is_array());
    }

    #[test]
    fn rejects_non_object_root_and_bad_json() {
        assert!(parse_batch(b"[1, 2]").is_err());
        assert!(parse_batch(b"{not json").is_err());
        assert!(parse_batch(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn keeps_entity_order_from_the_file() {
        let b = parse_batch(br#"{"z_table": [], "a_table": []}"#).unwrap();
        let keys: Vec<&str> = b.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z_table", "a_table"]);
    }
}

//! Canonical value forms used for comparison and persistence.
//!
//! Two forms exist:
//! - the **persisted** form: the text written for structured fields and used
//!   for scalar equality,
//! - the **comparable** form: a parsed document used for structured fields,
//!   so that key order and whitespace in stored JSON text do not register as
//!   changes.
//!
//! Every function here is total and deterministic.

pub use irx_schemas::canonical_json;
use irx_schemas::FieldKind;
use serde_json::{Number, Value};
use tracing::debug;

use crate::types::PersistValue;

// ---------------------------------------------------------------------------
// Persisted form
// ---------------------------------------------------------------------------

/// Canonical persisted string.
///
/// - mapping / sequence: compact JSON with object keys sorted recursively
/// - null: `""`
/// - bool: `true` / `false`
/// - number: its JSON text
/// - string: unchanged
pub fn canonical_persisted(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => canonical_json(value),
    }
}

/// Typed value to bind when writing `value` into a field of `kind`.
///
/// Structured fields always persist as canonical JSON text. Scalar fields keep
/// their JSON type so numeric and boolean columns accept them; a document that
/// arrives in a scalar field is written as its canonical JSON text.
pub fn persist_value(value: &Value, kind: FieldKind) -> PersistValue {
    if kind == FieldKind::Structured {
        return PersistValue::Text(canonical_persisted(value));
    }
    match value {
        Value::Null => PersistValue::Null,
        Value::Bool(b) => PersistValue::Bool(*b),
        Value::Number(n) => number_to_persist(n),
        Value::String(s) => PersistValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => PersistValue::Text(canonical_json(value)),
    }
}

fn number_to_persist(n: &Number) -> PersistValue {
    if let Some(i) = n.as_i64() {
        PersistValue::Integer(i)
    } else if n.is_f64() {
        n.as_f64()
            .map(PersistValue::Float)
            .unwrap_or_else(|| PersistValue::Text(n.to_string()))
    } else {
        // u64 above i64::MAX: keep the exact digits.
        PersistValue::Text(n.to_string())
    }
}

// ---------------------------------------------------------------------------
// Comparable form
// ---------------------------------------------------------------------------

/// Canonical comparable value for a structured field.
///
/// Documents are used as-is. Strings are parsed as JSON; if that fails, single
/// quotes are replaced with double quotes and parsing is retried (tolerates
/// Python-repr style text). If both attempts fail the trimmed string itself is
/// the comparable value. Blank strings compare as null.
///
/// The quote repair is a heuristic: text containing literal apostrophes can be
/// "repaired" into something different, or fail to parse and fall back to raw
/// text, so two semantically equal documents may still be reported as
/// different.
pub fn canonical_comparable(value: &Value) -> Value {
    match value {
        Value::String(s) => parse_lenient(s),
        other => other.clone(),
    }
}

fn parse_lenient(raw: &str) -> Value {
    let t = raw.trim();
    if t.is_empty() {
        return Value::Null;
    }
    if let Ok(v) = serde_json::from_str::<Value>(t) {
        return v;
    }
    let fixed = t.replace('\'', "\"");
    match serde_json::from_str::<Value>(&fixed) {
        Ok(v) => v,
        Err(_) => {
            debug!(value = t, "could not parse value as JSON; comparing as text");
            Value::String(t.to_string())
        }
    }
}

/// Deep equality over mapping/sequence/scalar.
///
/// Object key order is irrelevant; numbers compare by value (`1 == 1.0`).
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| structurally_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| structurally_equal(l, r)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
        return i == j;
    }
    if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
        return i == j;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(i), Some(j)) => i == j,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

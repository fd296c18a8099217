use std::fmt;

use irx_schemas::{EntitySchema, FieldKind};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ReconcileError;
use crate::normalizer::{canonical_persisted, persist_value};

/// One incoming record: field name -> value, in source order.
pub type Record = Map<String, Value>;

/// One batch: entity type -> list of records (shape checked by the driver).
pub type Batch = Map<String, Value>;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal outcome of reconciling a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Inserted,
    Updated,
    Skipped,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Inserted => "INSERTED",
            Outcome::Updated => "UPDATED",
            Outcome::Skipped => "SKIPPED",
            Outcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Unique key
// ---------------------------------------------------------------------------

/// Values of a record's unique key fields, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKey {
    fields: Vec<(String, Value)>,
}

impl UniqueKey {
    /// Extract the unique key from a (key-trimmed) record.
    ///
    /// Every key field must be present and non-null. A record is never
    /// matched on a partial key.
    pub fn extract(record: &Record, schema: &EntitySchema) -> Result<Self, ReconcileError> {
        let mut fields = Vec::with_capacity(schema.unique_keys().len());
        for k in schema.unique_keys() {
            match record.get(k) {
                Some(v) if !v.is_null() => fields.push((k.clone(), v.clone())),
                _ => return Err(ReconcileError::MissingIdentity { field: k.clone() }),
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// Key values as bindable scalars, in key order.
    pub fn persist_values(&self) -> Vec<(&str, PersistValue)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), persist_value(v, FieldKind::Scalar)))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.iter().cloned().collect())
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={}", canonical_persisted(v))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage exchange types
// ---------------------------------------------------------------------------

/// Lookup issued to the store: the explicit column list plus key predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub entity_type: String,
    /// Candidate's non-excluded fields union the unique key fields.
    pub columns: Vec<String>,
    pub key: UniqueKey,
}

/// Persisted row as returned by the store (only the requested columns).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingRow {
    values: Map<String, Value>,
}

impl ExistingRow {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl FromIterator<(String, Value)> for ExistingRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A typed value handed to the store for binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PersistValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PersistValue {
    /// Text form; identical to the canonical persisted string of the source value.
    pub fn to_text(&self) -> String {
        match self {
            PersistValue::Null => String::new(),
            PersistValue::Bool(b) => b.to_string(),
            PersistValue::Integer(i) => i.to_string(),
            PersistValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(|n| n.to_string())
                .unwrap_or_else(|| f.to_string()),
            PersistValue::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PersistValue::Null => Value::Null,
            PersistValue::Bool(b) => Value::Bool(*b),
            PersistValue::Integer(i) => Value::from(*i),
            PersistValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PersistValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// One column assignment in an insert or update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldWrite {
    pub field: String,
    pub value: PersistValue,
}

// ---------------------------------------------------------------------------
// Diff + events
// ---------------------------------------------------------------------------

/// A field whose canonical stored and incoming values differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    /// Canonical persisted text of the stored value ("" when absent or NULL).
    pub existing: String,
    /// Canonical persisted text of the incoming value.
    pub new: String,
}

/// Ordered field changes (candidate field order). Empty means "no change".
pub type FieldDiff = Vec<FieldChange>;

/// Observable result of one record, in the order records were processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEvent {
    pub entity_type: String,
    /// Position within the entity type's list; `None` when the whole entry was malformed.
    pub index: Option<usize>,
    pub outcome: Outcome,
    /// Stable reason code for skips and failures (e.g. `MISSING_IDENTITY`, `NO_CHANGES`).
    pub reason: Option<String>,
    pub unique_key: Option<Value>,
    /// Fields written by an update.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
    pub detail: Option<String>,
}

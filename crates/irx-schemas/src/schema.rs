use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Field kind
// ---------------------------------------------------------------------------

/// Comparison/persistence class of a field, resolved from the schema.
///
/// A string that happens to look like JSON is still `Scalar` unless the
/// schema declares the field structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Compared by canonical text.
    Scalar,
    /// Document-valued; compared by structural equality.
    Structured,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reasons an entity schema or registry definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Entity type name is empty or contains characters outside `[A-Za-z0-9_]`.
    InvalidEntityType(String),
    /// The unique key list is empty.
    EmptyUniqueKey,
    /// A unique key field is listed more than once.
    DuplicateUniqueKey(String),
    /// A unique key field is also excluded from writes.
    ExcludedUniqueKey(String),
    /// A field name is empty after trimming.
    EmptyFieldName,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::InvalidEntityType(name) => write!(
                f,
                "invalid entity type '{name}': only alphanumeric characters and underscores are allowed"
            ),
            SchemaError::EmptyUniqueKey => write!(f, "unique_keys must not be empty"),
            SchemaError::DuplicateUniqueKey(field) => {
                write!(f, "unique key field '{field}' is listed more than once")
            }
            SchemaError::ExcludedUniqueKey(field) => {
                write!(f, "unique key field '{field}' is also an excluded field")
            }
            SchemaError::EmptyFieldName => write!(f, "field names must not be empty"),
        }
    }
}

impl std::error::Error for SchemaError {}

// ---------------------------------------------------------------------------
// Entity schema
// ---------------------------------------------------------------------------

/// Reconciliation rules for one entity type.
///
/// Construct with [`EntitySchema::new`]; the invariants checked there hold for
/// the lifetime of the value (no mutators).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySchema {
    unique_keys: Vec<String>,
    excluded_fields: BTreeSet<String>,
    structured_fields: BTreeSet<String>,
}

impl EntitySchema {
    /// Build a schema. Field names are trimmed.
    ///
    /// Rejects an empty or duplicated unique key, empty field names, and any
    /// unique key field that is also excluded.
    pub fn new<K, E, S>(unique_keys: K, excluded_fields: E, structured_fields: S) -> Result<Self, SchemaError>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let unique_keys = trimmed(unique_keys)?;
        let excluded_fields: BTreeSet<String> = trimmed(excluded_fields)?.into_iter().collect();
        let structured_fields: BTreeSet<String> = trimmed(structured_fields)?.into_iter().collect();

        if unique_keys.is_empty() {
            return Err(SchemaError::EmptyUniqueKey);
        }

        let mut seen = BTreeSet::new();
        for k in &unique_keys {
            if !seen.insert(k.as_str()) {
                return Err(SchemaError::DuplicateUniqueKey(k.clone()));
            }
            if excluded_fields.contains(k) {
                return Err(SchemaError::ExcludedUniqueKey(k.clone()));
            }
        }

        Ok(Self {
            unique_keys,
            excluded_fields,
            structured_fields,
        })
    }

    /// Ordered unique key fields.
    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    pub fn excluded_fields(&self) -> &BTreeSet<String> {
        &self.excluded_fields
    }

    pub fn structured_fields(&self) -> &BTreeSet<String> {
        &self.structured_fields
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded_fields.contains(field)
    }

    pub fn is_unique_key(&self, field: &str) -> bool {
        self.unique_keys.iter().any(|k| k == field)
    }

    /// Resolve how `field` is compared and persisted.
    pub fn field_kind(&self, field: &str) -> FieldKind {
        if self.structured_fields.contains(field) {
            FieldKind::Structured
        } else {
            FieldKind::Scalar
        }
    }
}

fn trimmed<I>(items: I) -> Result<Vec<String>, SchemaError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| {
            let t = s.as_ref().trim();
            if t.is_empty() {
                Err(SchemaError::EmptyFieldName)
            } else {
                Ok(t.to_string())
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn field_kind_follows_structured_set() {
        let s = EntitySchema::new(["jira_key", "repo_url"], ["id"], ["issue_data"]).unwrap();
        assert_eq!(s.field_kind("issue_data"), FieldKind::Structured);
        assert_eq!(s.field_kind("summary"), FieldKind::Scalar);
        assert!(s.is_unique_key("repo_url"));
        assert!(s.is_excluded("id"));
    }

    #[test]
    fn names_are_trimmed() {
        let s = EntitySchema::new([" test_request_id "], [" id"], NONE).unwrap();
        assert_eq!(s.unique_keys(), &["test_request_id".to_string()]);
        assert!(s.is_excluded("id"));
    }

    #[test]
    fn rejects_invalid_definitions() {
        assert_eq!(
            EntitySchema::new(NONE, NONE, NONE).unwrap_err(),
            SchemaError::EmptyUniqueKey
        );
        assert_eq!(
            EntitySchema::new(["a", "a"], NONE, NONE).unwrap_err(),
            SchemaError::DuplicateUniqueKey("a".to_string())
        );
        assert_eq!(
            EntitySchema::new(["id"], ["id"], NONE).unwrap_err(),
            SchemaError::ExcludedUniqueKey("id".to_string())
        );
        assert_eq!(
            EntitySchema::new(["a"], ["  "], NONE).unwrap_err(),
            SchemaError::EmptyFieldName
        );
    }
}

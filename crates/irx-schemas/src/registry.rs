use std::collections::BTreeMap;

use crate::schema::{EntitySchema, SchemaError};

/// Returns true if `name` is usable as an entity type (and therefore table) name.
pub fn is_valid_entity_type(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Immutable entity type -> schema map.
///
/// Built once at startup and shared read-only by the reconciler. There is no
/// way to add or replace a schema after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// Build a registry, validating every entity type name.
    pub fn new<I, N>(schemas: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (N, EntitySchema)>,
        N: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, schema) in schemas {
            let name: String = name.into();
            if !is_valid_entity_type(&name) {
                return Err(SchemaError::InvalidEntityType(name));
            }
            map.insert(name, schema);
        }
        Ok(Self { schemas: map })
    }

    pub fn lookup(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity_type)
    }

    /// Registered entity types in sorted order.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntitySchema)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema::new(["test_request_id"], ["id", "created_date"], ["report_doc"]).unwrap()
    }

    #[test]
    fn entity_type_validation() {
        assert!(is_valid_entity_type("unit_test_records"));
        assert!(is_valid_entity_type("Table2"));
        assert!(!is_valid_entity_type(""));
        assert!(!is_valid_entity_type("bad table"));
        assert!(!is_valid_entity_type("x;drop"));
    }

    #[test]
    fn lookup_hit_and_miss() {
        let reg = SchemaRegistry::new([("sevenps_result_set", schema())]).unwrap();
        assert!(reg.lookup("sevenps_result_set").is_some());
        assert!(reg.lookup("unknown_table").is_none());
        assert_eq!(reg.entity_types().collect::<Vec<_>>(), vec!["sevenps_result_set"]);
    }

    #[test]
    fn invalid_name_rejected() {
        let err = SchemaRegistry::new([("bad-name", schema())]).unwrap_err();
        assert_eq!(err, SchemaError::InvalidEntityType("bad-name".to_string()));
    }
}

use irx_schemas::{EntitySchema, FieldKind};
use serde_json::Value;
use tracing::debug;

use crate::normalizer::{canonical_comparable, canonical_persisted, structurally_equal};
use crate::types::{ExistingRow, FieldChange, FieldDiff, Record};

/// Fields of `candidate` whose canonical value differs from `existing`.
///
/// Only fields present in the candidate are considered, in candidate order;
/// excluded fields are ignored. A stored value that is absent or NULL reads
/// as the empty string.
pub fn diff(existing: &ExistingRow, candidate: &Record, schema: &EntitySchema) -> FieldDiff {
    let mut changes = FieldDiff::new();

    for (field, value) in candidate {
        if schema.is_excluded(field) {
            continue;
        }

        let new_text = canonical_persisted(value);
        let stored = existing.get(field).unwrap_or(&Value::Null);
        let existing_text = canonical_persisted(stored);

        let differs = match schema.field_kind(field) {
            FieldKind::Structured => {
                let old = canonical_comparable(stored);
                let new = canonical_comparable(&Value::String(new_text.clone()));
                !structurally_equal(&old, &new)
            }
            FieldKind::Scalar => existing_text != new_text,
        };

        if differs {
            debug!(
                field = field.as_str(),
                existing = existing_text.as_str(),
                new = new_text.as_str(),
                "field differs"
            );
            changes.push(FieldChange {
                field: field.clone(),
                existing: existing_text,
                new: new_text,
            });
        }
    }

    changes
}

use std::fmt;

use crate::types::Outcome;

/// Why a record did not resolve to an insert or update.
///
/// Every variant is local to a single record: the batch driver turns it into
/// an [`Outcome`] and carries on with the next record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// No schema registered for the entity type.
    ConfigurationMiss { entity_type: String },
    /// A unique key field is absent or null.
    MissingIdentity { field: String },
    /// The store failed to look the row up. No write was attempted.
    LookupFailure(String),
    /// The store failed to apply an insert or update.
    WriteFailure(String),
    /// The batch entry is not a list, or a list element is not a mapping.
    MalformedBatchShape(String),
}

impl ReconcileError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::ConfigurationMiss { .. } => "CONFIGURATION_MISS",
            ReconcileError::MissingIdentity { .. } => "MISSING_IDENTITY",
            ReconcileError::LookupFailure(_) => "LOOKUP_FAILURE",
            ReconcileError::WriteFailure(_) => "WRITE_FAILURE",
            ReconcileError::MalformedBatchShape(_) => "MALFORMED_BATCH_SHAPE",
        }
    }

    /// Data-shape and configuration problems are skips; identity and storage
    /// problems are failures.
    pub fn outcome(&self) -> Outcome {
        match self {
            ReconcileError::ConfigurationMiss { .. } | ReconcileError::MalformedBatchShape(_) => {
                Outcome::Skipped
            }
            ReconcileError::MissingIdentity { .. }
            | ReconcileError::LookupFailure(_)
            | ReconcileError::WriteFailure(_) => Outcome::Failed,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::ConfigurationMiss { entity_type } => {
                write!(f, "no configuration found for entity type '{entity_type}'")
            }
            ReconcileError::MissingIdentity { field } => {
                write!(f, "missing unique key field '{field}'")
            }
            ReconcileError::LookupFailure(msg) => write!(f, "lookup failed: {msg}"),
            ReconcileError::WriteFailure(msg) => write!(f, "write failed: {msg}"),
            ReconcileError::MalformedBatchShape(msg) => write!(f, "malformed batch entry: {msg}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_and_failures_are_classified() {
        let miss = ReconcileError::ConfigurationMiss {
            entity_type: "unknown_table".to_string(),
        };
        assert_eq!(miss.outcome(), Outcome::Skipped);
        assert_eq!(
            ReconcileError::MalformedBatchShape("x".into()).outcome(),
            Outcome::Skipped
        );
        assert_eq!(
            ReconcileError::MissingIdentity {
                field: "artifact_version".into()
            }
            .outcome(),
            Outcome::Failed
        );
        assert_eq!(ReconcileError::LookupFailure("x".into()).outcome(), Outcome::Failed);
        assert_eq!(ReconcileError::WriteFailure("x".into()).code(), "WRITE_FAILURE");
        assert!(miss.to_string().contains("unknown_table"));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use irx_schemas::{EntitySchema, SchemaRegistry};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::differ::diff;
use crate::error::ReconcileError;
use crate::normalizer::persist_value;
use crate::stats::{RunStatistics, StatsTracker};
use crate::store::Store;
use crate::types::{
    Batch, FieldDiff, FieldWrite, LookupRequest, Outcome, Record, RecordEvent, UniqueKey,
};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True if the run stopped early; `stats` and `events` then cover only
    /// the records processed before the stop.
    pub cancelled: bool,
    pub stats: RunStatistics,
    pub events: Vec<RecordEvent>,
}

// ---------------------------------------------------------------------------
// Per-record resolution
// ---------------------------------------------------------------------------

enum Resolution {
    Inserted {
        key: UniqueKey,
    },
    Updated {
        key: UniqueKey,
        changes: FieldDiff,
    },
    Unchanged {
        key: UniqueKey,
    },
    Rejected {
        key: Option<UniqueKey>,
        error: ReconcileError,
    },
}

impl Resolution {
    fn rejected(error: ReconcileError) -> Self {
        Resolution::Rejected { key: None, error }
    }
}

/// Trim surrounding whitespace from every field name.
///
/// If two names collide after trimming, the later value wins and keeps the
/// position of the first occurrence.
pub fn clean_record_keys(record: Record) -> Record {
    record
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v))
        .collect()
}

/// Columns requested on lookup: the candidate's non-excluded fields (in
/// candidate order) followed by any unique key field not already listed.
pub fn lookup_columns(record: &Record, schema: &EntitySchema) -> Vec<String> {
    let mut cols: Vec<String> = record
        .keys()
        .filter(|k| !schema.is_excluded(k))
        .cloned()
        .collect();
    for k in schema.unique_keys() {
        if !cols.contains(k) {
            cols.push(k.clone());
        }
    }
    cols
}

fn insert_writes(record: &Record, schema: &EntitySchema) -> Vec<FieldWrite> {
    record
        .iter()
        .filter(|(k, _)| !schema.is_excluded(k))
        .map(|(k, v)| FieldWrite {
            field: k.clone(),
            value: persist_value(v, schema.field_kind(k)),
        })
        .collect()
}

fn update_writes(record: &Record, schema: &EntitySchema, changes: &FieldDiff) -> Vec<FieldWrite> {
    changes
        .iter()
        .map(|c| FieldWrite {
            field: c.field.clone(),
            value: persist_value(
                record.get(&c.field).unwrap_or(&Value::Null),
                schema.field_kind(&c.field),
            ),
        })
        .collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Sequential insert/update/skip engine over a [`Store`].
///
/// Records are resolved one at a time, so a later record always observes the
/// writes of earlier ones. Statistics belong to this reconciler and are never
/// shared with another one.
pub struct Reconciler<S> {
    registry: Arc<SchemaRegistry>,
    store: S,
    stats: StatsTracker,
}

impl<S: Store> Reconciler<S> {
    pub fn new(registry: Arc<SchemaRegistry>, store: S) -> Self {
        let mut stats = StatsTracker::new();
        stats.reset(registry.entity_types());
        Self {
            registry,
            store,
            stats,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Current counters.
    pub fn stats(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    /// Zero all counters (registered entity types stay listed at zero).
    pub fn reset_stats(&mut self) {
        self.stats.reset(self.registry.entity_types());
    }

    /// Reconcile one record and return its terminal outcome.
    pub async fn reconcile(&mut self, entity_type: &str, record: Record) -> Outcome {
        self.reconcile_event(entity_type, None, record).await.outcome
    }

    /// Reconcile one record and return the full event.
    ///
    /// Never returns an error: lookup/write failures, missing identity and
    /// configuration misses are folded into the event's outcome.
    pub async fn reconcile_event(
        &mut self,
        entity_type: &str,
        index: Option<usize>,
        record: Record,
    ) -> RecordEvent {
        let record = clean_record_keys(record);
        let resolution = self.resolve(entity_type, &record).await;
        self.finish(entity_type, index, resolution)
    }

    async fn resolve(&self, entity_type: &str, record: &Record) -> Resolution {
        let Some(schema) = self.registry.lookup(entity_type) else {
            return Resolution::rejected(ReconcileError::ConfigurationMiss {
                entity_type: entity_type.to_string(),
            });
        };

        let key = match UniqueKey::extract(record, schema) {
            Ok(k) => k,
            Err(e) => return Resolution::rejected(e),
        };

        let req = LookupRequest {
            entity_type: entity_type.to_string(),
            columns: lookup_columns(record, schema),
            key,
        };

        let existing = match self.store.lookup(&req).await {
            Ok(row) => row,
            Err(e) => {
                return Resolution::Rejected {
                    key: Some(req.key),
                    error: ReconcileError::LookupFailure(format!("{e:#}")),
                }
            }
        };
        let key = req.key;

        match existing {
            None => {
                let writes = insert_writes(record, schema);
                match self.store.insert(entity_type, &writes).await {
                    Ok(()) => Resolution::Inserted { key },
                    Err(e) => Resolution::Rejected {
                        key: Some(key),
                        error: ReconcileError::WriteFailure(format!("{e:#}")),
                    },
                }
            }
            Some(row) => {
                let changes = diff(&row, record, schema);
                if changes.is_empty() {
                    return Resolution::Unchanged { key };
                }
                let writes = update_writes(record, schema, &changes);
                match self.store.update(entity_type, &writes, &key).await {
                    Ok(()) => Resolution::Updated { key, changes },
                    Err(e) => Resolution::Rejected {
                        key: Some(key),
                        error: ReconcileError::WriteFailure(format!("{e:#}")),
                    },
                }
            }
        }
    }

    /// Count, log, and describe a terminal resolution.
    fn finish(&mut self, entity_type: &str, index: Option<usize>, resolution: Resolution) -> RecordEvent {
        let event = match resolution {
            Resolution::Inserted { key } => {
                info!(entity_type, key = %key, "inserted new record");
                RecordEvent {
                    entity_type: entity_type.to_string(),
                    index,
                    outcome: Outcome::Inserted,
                    reason: None,
                    unique_key: Some(key.to_json()),
                    changed_fields: Vec::new(),
                    detail: None,
                }
            }
            Resolution::Updated { key, changes } => {
                let fields: Vec<String> = changes.into_iter().map(|c| c.field).collect();
                info!(entity_type, key = %key, fields = ?fields, "updated record");
                RecordEvent {
                    entity_type: entity_type.to_string(),
                    index,
                    outcome: Outcome::Updated,
                    reason: None,
                    unique_key: Some(key.to_json()),
                    changed_fields: fields,
                    detail: None,
                }
            }
            Resolution::Unchanged { key } => {
                info!(entity_type, key = %key, "no changes detected; skipping update");
                RecordEvent {
                    entity_type: entity_type.to_string(),
                    index,
                    outcome: Outcome::Skipped,
                    reason: Some("NO_CHANGES".to_string()),
                    unique_key: Some(key.to_json()),
                    changed_fields: Vec::new(),
                    detail: None,
                }
            }
            Resolution::Rejected { key, error } => {
                let outcome = error.outcome();
                if outcome == Outcome::Failed {
                    error!(entity_type, index = ?index, reason = error.code(), "{error}; counting as failure");
                } else {
                    warn!(entity_type, index = ?index, reason = error.code(), "{error}; skipping record");
                }
                RecordEvent {
                    entity_type: entity_type.to_string(),
                    index,
                    outcome,
                    reason: Some(error.code().to_string()),
                    unique_key: key.map(|k| k.to_json()),
                    changed_fields: Vec::new(),
                    detail: Some(error.to_string()),
                }
            }
        };

        self.stats.record(entity_type, event.outcome);
        event
    }

    // -----------------------------------------------------------------------
    // Batch driver
    // -----------------------------------------------------------------------

    /// Reconcile a whole batch (entity type -> list of records) in input order.
    pub async fn run_batch(&mut self, batch: Batch) -> BatchReport {
        let never = AtomicBool::new(false);
        self.run_batch_cancellable(batch, &never).await
    }

    /// Like [`Reconciler::run_batch`], checking `cancel` before every record.
    ///
    /// Writes applied before cancellation are kept; the report then covers
    /// only the records processed up to that point.
    pub async fn run_batch_cancellable(&mut self, batch: Batch, cancel: &AtomicBool) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.reset_stats();

        info!(%run_id, entity_types = batch.len(), "reconciliation batch started");

        let mut events: Vec<RecordEvent> = Vec::new();
        let mut cancelled = false;

        'entities: for (entity_type, entry) in batch {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let records = match entry {
                Value::Array(records) => records,
                other => {
                    let err = ReconcileError::MalformedBatchShape(format!(
                        "data for entity type '{entity_type}' is {} and not a list",
                        json_kind(&other)
                    ));
                    events.push(self.finish(&entity_type, None, Resolution::rejected(err)));
                    continue;
                }
            };

            info!(entity_type = entity_type.as_str(), records = records.len(), "processing records");

            for (index, item) in records.into_iter().enumerate() {
                if cancel.load(Ordering::SeqCst) {
                    cancelled = true;
                    break 'entities;
                }

                let event = match item {
                    Value::Object(record) => {
                        self.reconcile_event(&entity_type, Some(index), record).await
                    }
                    other => {
                        let err = ReconcileError::MalformedBatchShape(format!(
                            "record is {} and not a mapping",
                            json_kind(&other)
                        ));
                        self.finish(&entity_type, Some(index), Resolution::rejected(err))
                    }
                };
                events.push(event);
            }
        }

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            stats: self.stats.snapshot(),
            events,
        };

        if report.cancelled {
            warn!(%run_id, processed = report.events.len(), "reconciliation batch cancelled");
        }
        log_summary(&report);
        report
    }
}

fn log_summary(report: &BatchReport) {
    let g = &report.stats.global;
    info!(
        run_id = %report.run_id,
        total = g.total,
        inserted = g.inserted,
        updated = g.updated,
        skipped = g.skipped,
        failed = g.failed,
        "batch statistics"
    );
    for (entity_type, c) in &report.stats.per_entity {
        info!(
            entity_type = entity_type.as_str(),
            total = c.total,
            inserted = c.inserted,
            updated = c.updated,
            skipped = c.skipped,
            failed = c.failed,
            "entity statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn keys_are_trimmed_and_collisions_keep_first_position() {
        let r = record(json!({" a ": 1, "b": 2, "a": 3}));
        let cleaned = clean_record_keys(r);
        let keys: Vec<&str> = cleaned.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(cleaned["a"], json!(3));
    }

    #[test]
    fn lookup_columns_are_candidate_fields_plus_keys() {
        let schema = EntitySchema::new(["jira_key", "repo_url"], ["id"], ["issue_data"]).unwrap();
        let r = record(json!({"id": 1, "summary": "s", "jira_key": "K-1", "issue_data": {}}));
        assert_eq!(
            lookup_columns(&r, &schema),
            vec!["summary", "jira_key", "issue_data", "repo_url"]
        );
    }

    #[test]
    fn update_writes_cover_exactly_the_diff() {
        let schema = EntitySchema::new(["k"], ["id"], ["doc"]).unwrap();
        let r = record(json!({"k": "1", "a": 5, "doc": {"z": 1, "y": 2}, "b": "same"}));
        let changes = vec![
            crate::types::FieldChange {
                field: "a".into(),
                existing: "4".into(),
                new: "5".into(),
            },
            crate::types::FieldChange {
                field: "doc".into(),
                existing: "".into(),
                new: r#"{"y":2,"z":1}"#.into(),
            },
        ];
        let writes = update_writes(&r, &schema, &changes);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].value, crate::types::PersistValue::Integer(5));
        assert_eq!(
            writes[1].value,
            crate::types::PersistValue::Text(r#"{"y":2,"z":1}"#.into())
        );
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use irx_reconcile::normalizer::canonical_persisted;
use irx_reconcile::{ExistingRow, FieldWrite, LookupRequest, Store, UniqueKey};
use serde_json::{Map, Value};

type Row = Map<String, Value>;

/// A store call as observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Lookup {
        entity_type: String,
        columns: Vec<String>,
        key: Value,
    },
    Insert {
        entity_type: String,
        fields: Vec<FieldWrite>,
    },
    Update {
        entity_type: String,
        fields: Vec<FieldWrite>,
        key: Value,
    },
}

/// Which store operation an injected fault targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Lookup,
    Write,
}

#[derive(Debug)]
struct Armed {
    fault: Fault,
    field: String,
    value: Value,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Row>>,
    calls: Vec<StoreCall>,
    faults: Vec<Armed>,
    next_id: i64,
}

/// In-memory [`Store`] used by the scenario tests.
///
/// Rows behave like the Postgres store: lookups return only the requested
/// columns, every non-null value comes back as text, and `id` is assigned by
/// the store on insert. Clones share the same tables.
///
/// Every column behaves like `text`: there is no typed column to reject a
/// value, so a structured null (written as `""`) is accepted here while a
/// Postgres `jsonb` column refuses it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Put a row in place as-is (no `id` assignment, no call recorded).
    pub fn seed(&self, entity_type: &str, row: Value) -> Result<()> {
        let Value::Object(row) = row else {
            return Err(anyhow!("seed row must be a JSON object"));
        };
        self.lock()
            .tables
            .entry(entity_type.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    /// Fail every `fault` operation on records whose key `field` equals `value`.
    pub fn fail_on(&self, fault: Fault, field: &str, value: Value) {
        self.lock().faults.push(Armed {
            fault,
            field: field.to_string(),
            value,
        });
    }

    pub fn rows(&self, entity_type: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn lookup_count(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Lookup { .. }))
    }

    pub fn insert_count(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Insert { .. }))
    }

    pub fn update_count(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Update { .. }))
    }

    fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

impl Inner {
    fn tripped(&self, fault: Fault, key: &UniqueKey) -> bool {
        self.faults.iter().any(|a| {
            a.fault == fault && key.get(&a.field).is_some_and(|v| same_text(v, &a.value))
        })
    }
}

fn same_text(a: &Value, b: &Value) -> bool {
    !a.is_null() && !b.is_null() && canonical_persisted(a) == canonical_persisted(b)
}

fn row_matches(row: &Row, key: &UniqueKey) -> bool {
    key.fields()
        .iter()
        .all(|(k, v)| row.get(k).is_some_and(|stored| same_text(stored, v)))
}

fn as_text(v: &Value) -> Value {
    match v {
        Value::Null => Value::Null,
        other => Value::String(canonical_persisted(other)),
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn lookup(&self, req: &LookupRequest) -> Result<Option<ExistingRow>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Lookup {
            entity_type: req.entity_type.clone(),
            columns: req.columns.clone(),
            key: req.key.to_json(),
        });

        if inner.tripped(Fault::Lookup, &req.key) {
            return Err(anyhow!("injected lookup fault for {}", req.key));
        }

        let found = inner
            .tables
            .get(&req.entity_type)
            .and_then(|rows| rows.iter().find(|r| row_matches(r, &req.key)));

        Ok(found.map(|row| {
            req.columns
                .iter()
                .map(|c| (c.clone(), row.get(c).map(as_text).unwrap_or(Value::Null)))
                .collect()
        }))
    }

    async fn insert(&self, entity_type: &str, fields: &[FieldWrite]) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Insert {
            entity_type: entity_type.to_string(),
            fields: fields.to_vec(),
        });

        let key_probe: Row = fields
            .iter()
            .map(|w| (w.field.clone(), w.value.to_json()))
            .collect();
        let faulted = inner.faults.iter().any(|a| {
            a.fault == Fault::Write && key_probe.get(&a.field).is_some_and(|v| same_text(v, &a.value))
        });
        if faulted {
            return Err(anyhow!("injected write fault on insert into {entity_type}"));
        }

        inner.next_id += 1;
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(inner.next_id));
        for (k, v) in key_probe {
            row.insert(k, v);
        }
        inner.tables.entry(entity_type.to_string()).or_default().push(row);
        Ok(())
    }

    async fn update(&self, entity_type: &str, fields: &[FieldWrite], key: &UniqueKey) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Update {
            entity_type: entity_type.to_string(),
            fields: fields.to_vec(),
            key: key.to_json(),
        });

        if inner.tripped(Fault::Write, key) {
            return Err(anyhow!("injected write fault on update of {key}"));
        }

        if let Some(row) = inner
            .tables
            .get_mut(entity_type)
            .and_then(|rows| rows.iter_mut().find(|r| row_matches(r, key)))
        {
            for w in fields {
                row.insert(w.field.clone(), w.value.to_json());
            }
        }
        Ok(())
    }
}

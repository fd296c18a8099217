//! Scenario: a store error fails one record and the batch carries on.
//!
//! # Invariant under test
//! - lookup error: record FAILED, no write attempted for it,
//! - write error: record FAILED, nothing persisted for it,
//! - the records before and after are unaffected.

use irx_reconcile::{Outcome, Reconciler};
use irx_testkit::{default_registry, unit_test_record, Fault, MemoryStore, StoreCall};
use serde_json::{json, Value};

const ENTITY: &str = "unit_test_records";

fn three_records() -> anyhow::Result<irx_reconcile::Batch> {
    let list = ["suite-a", "suite-b", "suite-c"]
        .into_iter()
        .map(|n| unit_test_record(n, "1.0", 0.8).map(Value::Object))
        .collect::<anyhow::Result<Vec<Value>>>()?;
    let mut b = irx_reconcile::Batch::new();
    b.insert(ENTITY.to_string(), Value::Array(list));
    Ok(b)
}

#[tokio::test]
async fn lookup_failure_is_isolated() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.fail_on(Fault::Lookup, "artifact_name", json!("suite-b"));
    let mut rec = Reconciler::new(default_registry()?, store.clone());

    let report = rec.run_batch(three_records()?).await;
    let outcomes: Vec<Outcome> = report.events.iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Inserted, Outcome::Failed, Outcome::Inserted]);
    assert_eq!(report.events[1].reason.as_deref(), Some("LOOKUP_FAILURE"));
    assert_eq!(report.events[1].unique_key.as_ref().map(|k| &k["artifact_name"]), Some(&json!("suite-b")));

    // Three lookups, two inserts: the failed lookup was never followed by a write.
    assert_eq!(store.lookup_count(), 3);
    assert_eq!(store.insert_count(), 2);
    let inserted: Vec<Value> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::Insert { fields, .. } => fields
                .into_iter()
                .find(|w| w.field == "artifact_name")
                .map(|w| w.value.to_json()),
            _ => None,
        })
        .collect();
    assert_eq!(inserted, vec![json!("suite-a"), json!("suite-c")]);

    assert_eq!(report.stats.global.failed, 1);
    assert_eq!(report.stats.global.inserted, 2);
    Ok(())
}

#[tokio::test]
async fn write_failure_is_isolated() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.fail_on(Fault::Write, "artifact_name", json!("suite-b"));
    let mut rec = Reconciler::new(default_registry()?, store.clone());

    let report = rec.run_batch(three_records()?).await;
    let outcomes: Vec<Outcome> = report.events.iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Inserted, Outcome::Failed, Outcome::Inserted]);
    assert_eq!(report.events[1].reason.as_deref(), Some("WRITE_FAILURE"));
    assert_eq!(store.rows(ENTITY).len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_update_leaves_row_untouched() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let mut rec = Reconciler::new(default_registry()?, store.clone());
    assert_eq!(
        rec.reconcile(ENTITY, unit_test_record("suite-b", "1.0", 0.8)?).await,
        Outcome::Inserted
    );

    store.fail_on(Fault::Write, "artifact_name", json!("suite-b"));
    assert_eq!(
        rec.reconcile(ENTITY, unit_test_record("suite-b", "1.0", 0.9)?).await,
        Outcome::Failed
    );
    assert_eq!(store.rows(ENTITY)[0]["coverage"], json!(0.8));
    assert_eq!(rec.stats().global.failed, 1);
    Ok(())
}

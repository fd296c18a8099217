// DB-backed reconciliation round trip through PgStore.
//
// Skipped if IRX_DATABASE_URL is not set. Creates and drops its own table.

use std::sync::Arc;

use anyhow::Result;
use irx_db::PgStore;
use irx_reconcile::{Outcome, Reconciler, Record};
use irx_schemas::{EntitySchema, SchemaRegistry};
use serde_json::json;
use sqlx::{PgPool, Row};

fn record(v: serde_json::Value) -> Record {
    v.as_object().cloned().unwrap_or_default()
}

async fn pool_from_env() -> Result<Option<PgPool>> {
    match std::env::var(irx_db::ENV_DB_URL) {
        Ok(url) => Ok(Some(irx_db::connect(&url).await?)),
        Err(_) => {
            eprintln!("SKIP: IRX_DATABASE_URL not set");
            Ok(None)
        }
    }
}

fn scratch_table() -> String {
    format!("irx_scenario_{}", uuid::Uuid::new_v4().simple())
}

fn reconciler(pool: &PgPool, table: &str) -> Result<Reconciler<PgStore>> {
    let schema = EntitySchema::new(["jira_key", "repo_url"], ["id", "created_date"], ["issue_data"])?;
    let registry = Arc::new(SchemaRegistry::new([(table.to_string(), schema)])?);
    Ok(Reconciler::new(registry, PgStore::new(pool.clone())))
}

async fn drop_table(pool: &PgPool, table: &str) -> Result<()> {
    sqlx::query(&format!(r#"drop table "{table}""#))
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn insert_skip_update_against_postgres() -> Result<()> {
    let Some(pool) = pool_from_env().await? else {
        return Ok(());
    };

    let table = scratch_table();
    sqlx::query(&format!(
        r#"
        create table "{table}" (
          id serial primary key,
          created_date timestamptz not null default now(),
          jira_key text not null,
          repo_url text not null,
          summary text,
          points integer,
          flaky boolean,
          issue_data jsonb
        )
        "#
    ))
    .execute(&pool)
    .await?;

    let mut rec = reconciler(&pool, &table)?;

    let first = record(json!({
        "jira_key": "QA-1",
        "repo_url": "r",
        "summary": "Login fails",
        "points": 3,
        "flaky": false,
        "issue_data": {"status": "Open", "labels": ["auth"]},
    }));
    assert_eq!(rec.reconcile(&table, first.clone()).await, Outcome::Inserted);

    // jsonb normalizes its own text; the structured compare must still match.
    assert_eq!(rec.reconcile(&table, first).await, Outcome::Skipped);

    let changed = json!({
        "jira_key": "QA-1",
        "repo_url": "r",
        "summary": "Login fails",
        "points": 5,
        "issue_data": {"labels": ["auth"], "status": "Open"},
    });
    assert_eq!(rec.reconcile(&table, record(changed.clone())).await, Outcome::Updated);

    // Reading back what was just written reports no drift.
    assert_eq!(rec.reconcile(&table, record(changed)).await, Outcome::Skipped);

    let row = sqlx::query(&format!(
        r#"select count(*) over () as n, points from "{table}" where jira_key = 'QA-1'"#
    ))
    .fetch_one(&pool)
    .await?;
    let n: i64 = row.try_get("n")?;
    let points: Option<i32> = row.try_get("points")?;
    assert_eq!(n, 1);
    assert_eq!(points, Some(5));

    // Incomplete key: fails before any SQL is issued.
    assert_eq!(
        rec.reconcile(&table, record(json!({"jira_key": "QA-2"}))).await,
        Outcome::Failed
    );

    drop_table(&pool, &table).await
}

#[tokio::test]
async fn over_long_values_fail_instead_of_truncating() -> Result<()> {
    let Some(pool) = pool_from_env().await? else {
        return Ok(());
    };

    let table = scratch_table();
    sqlx::query(&format!(
        r#"
        create table "{table}" (
          id serial primary key,
          created_date timestamptz not null default now(),
          jira_key varchar(10) not null,
          repo_url varchar(10) not null,
          summary varchar(5),
          issue_data jsonb
        )
        "#
    ))
    .execute(&pool)
    .await?;
    let mut rec = reconciler(&pool, &table)?;

    let fits = json!({"jira_key": "0123456789", "repo_url": "r", "summary": "aaa"});
    assert_eq!(rec.reconcile(&table, record(fits.clone())).await, Outcome::Inserted);
    assert_eq!(rec.reconcile(&table, record(fits)).await, Outcome::Skipped);

    // A key longer than the column must not match the row holding its prefix.
    assert_eq!(
        rec.reconcile(
            &table,
            record(json!({"jira_key": "0123456789XYZ", "repo_url": "r", "summary": "bbb"}))
        )
        .await,
        Outcome::Failed
    );

    // An over-long value is rejected by the column, every time.
    let too_long = json!({"jira_key": "K", "repo_url": "r", "summary": "toolongvalue"});
    for _ in 0..2 {
        assert_eq!(rec.reconcile(&table, record(too_long.clone())).await, Outcome::Failed);
    }

    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as(&format!(r#"select jira_key, summary from "{table}" order by id"#))
            .fetch_all(&pool)
            .await?;
    assert_eq!(rows, vec![("0123456789".to_string(), Some("aaa".to_string()))]);

    drop_table(&pool, &table).await
}

#[tokio::test]
async fn structured_null_is_rejected_by_jsonb_column() -> Result<()> {
    let Some(pool) = pool_from_env().await? else {
        return Ok(());
    };

    let table = scratch_table();
    sqlx::query(&format!(
        r#"
        create table "{table}" (
          id serial primary key,
          created_date timestamptz not null default now(),
          jira_key text not null,
          repo_url text not null,
          summary text,
          issue_data jsonb
        )
        "#
    ))
    .execute(&pool)
    .await?;
    let mut rec = reconciler(&pool, &table)?;

    // A structured null persists as empty text, which jsonb does not accept.
    let null_doc = json!({"jira_key": "QA-9", "repo_url": "r", "issue_data": null});
    assert_eq!(rec.reconcile(&table, record(null_doc)).await, Outcome::Failed);

    // Leaving the field out writes nothing to it.
    let absent = json!({"jira_key": "QA-9", "repo_url": "r", "summary": "no doc"});
    assert_eq!(rec.reconcile(&table, record(absent.clone())).await, Outcome::Inserted);
    assert_eq!(rec.reconcile(&table, record(absent)).await, Outcome::Skipped);

    let stats = rec.stats().entity(&table);
    assert_eq!((stats.failed, stats.inserted, stats.skipped), (1, 1, 1));

    drop_table(&pool, &table).await
}

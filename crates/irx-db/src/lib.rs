//! irx-db
//!
//! Postgres side of reconciliation:
//! - pool construction from `IRX_DATABASE_URL`,
//! - a connectivity / table-presence status query,
//! - [`PgStore`], the [`irx_reconcile::Store`] implementation.
//!
//! Tables are never created or migrated here; they are owned elsewhere.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::BTreeMap;

mod pg_store;
mod sql;

pub use pg_store::PgStore;
pub use sql::{quote_ident, SqlStatement};

pub const ENV_DB_URL: &str = "IRX_DATABASE_URL";

/// Connect to Postgres using IRX_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

#[derive(Debug, Clone, Serialize)]
pub struct DbStatus {
    pub ok: bool,
    /// Entity type -> whether a table of that name is visible.
    pub tables: BTreeMap<String, bool>,
}

/// Connectivity check plus presence of each entity table.
pub async fn status<'a>(
    pool: &PgPool,
    entity_types: impl IntoIterator<Item = &'a str>,
) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let mut tables = BTreeMap::new();
    for t in entity_types {
        let (exists,): (bool,) =
            sqlx::query_as::<_, (bool,)>("select to_regclass($1) is not null")
                .bind(quote_ident(t))
                .fetch_one(pool)
                .await
                .with_context(|| format!("status table-exists query failed for {t}"))?;
        tables.insert(t.to_string(), exists);
    }

    Ok(DbStatus { ok: one == 1, tables })
}

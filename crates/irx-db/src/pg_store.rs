use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use irx_reconcile::{ExistingRow, FieldWrite, LookupRequest, Store, UniqueKey};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::sql::{insert_sql, quote_ident, select_sql, update_sql, ColumnTypes, SqlStatement};

/// [`Store`] over a Postgres pool. Entity types map 1:1 to table names.
///
/// Column types are read from the catalog the first time a table is touched
/// and cached for the lifetime of the store. Types are read without their
/// modifier (`character varying`, never `character varying(10)`): an explicit
/// cast to a sized type truncates silently, so an over-long key must reach the
/// column as-is and fail there.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    column_types: Arc<Mutex<HashMap<String, Arc<ColumnTypes>>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            column_types: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn cached_types(&self, table: &str) -> Option<Arc<ColumnTypes>> {
        self.column_types
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .cloned()
    }

    async fn column_types(&self, table: &str) -> Result<Arc<ColumnTypes>> {
        if let Some(t) = self.cached_types(table) {
            return Ok(t);
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            select a.attname::text, format_type(a.atttypid, NULL)
            from pg_attribute a
            where a.attrelid = to_regclass($1)
              and a.attnum > 0
              and not a.attisdropped
            "#,
        )
        .bind(quote_ident(table))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("column type query failed for {table}"))?;

        // A missing table yields no rows; the statement itself then fails
        // with Postgres' own "relation does not exist" error.
        let types: Arc<ColumnTypes> = Arc::new(rows.into_iter().collect());
        debug!(table, columns = types.len(), "loaded column types");
        self.column_types
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_string(), Arc::clone(&types));
        Ok(types)
    }

    async fn execute(&self, st: &SqlStatement) -> Result<u64> {
        let mut q = sqlx::query(&st.sql);
        for b in &st.binds {
            q = q.bind(b.as_str());
        }
        let res = q.execute(&self.pool).await?;
        Ok(res.rows_affected())
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn lookup(&self, req: &LookupRequest) -> Result<Option<ExistingRow>> {
        let types = self.column_types(&req.entity_type).await?;
        let st = select_sql(&req.entity_type, &req.columns, &req.key, &types);
        debug!(sql = st.sql.as_str(), "lookup");

        let mut q = sqlx::query(&st.sql);
        for b in &st.binds {
            q = q.bind(b.as_str());
        }
        let row = q
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", req.entity_type))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut values = serde_json::Map::new();
        for (i, col) in req.columns.iter().enumerate() {
            let v: Option<String> = row
                .try_get(i)
                .with_context(|| format!("decode column {col}"))?;
            values.insert(col.clone(), v.map(Value::String).unwrap_or(Value::Null));
        }
        Ok(Some(ExistingRow::new(values)))
    }

    async fn insert(&self, entity_type: &str, fields: &[FieldWrite]) -> Result<()> {
        if fields.is_empty() {
            bail!("insert into {entity_type} with no fields");
        }
        let types = self.column_types(entity_type).await?;
        let st = insert_sql(entity_type, fields, &types);
        debug!(sql = st.sql.as_str(), "insert");
        self.execute(&st)
            .await
            .with_context(|| format!("insert into {entity_type} failed"))?;
        Ok(())
    }

    async fn update(&self, entity_type: &str, fields: &[FieldWrite], key: &UniqueKey) -> Result<()> {
        if fields.is_empty() {
            bail!("update of {entity_type} with no fields");
        }
        let types = self.column_types(entity_type).await?;
        let st = update_sql(entity_type, fields, key, &types);
        debug!(sql = st.sql.as_str(), "update");
        let n = self
            .execute(&st)
            .await
            .with_context(|| format!("update of {entity_type} failed"))?;
        debug!(entity_type, rows = n, "update applied");
        Ok(())
    }
}

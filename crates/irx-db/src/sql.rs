use std::collections::HashMap;

use irx_reconcile::{FieldWrite, PersistValue, UniqueKey};

/// Column name -> Postgres type name without its modifier (`format_type(oid, NULL)`).
pub(crate) type ColumnTypes = HashMap<String, String>;

/// SQL text plus its positional parameters, all sent as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<String>,
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Collects parameters. Each one is sent as text and cast to the column's
/// type when known, so the same statement works for text, numeric, boolean
/// and json columns. NULL is emitted inline.
struct Params<'a> {
    types: &'a ColumnTypes,
    binds: Vec<String>,
}

impl<'a> Params<'a> {
    fn new(types: &'a ColumnTypes) -> Self {
        Self {
            types,
            binds: Vec::new(),
        }
    }

    fn push(&mut self, column: &str, value: &PersistValue) -> String {
        if *value == PersistValue::Null {
            return "NULL".to_string();
        }
        self.binds.push(value.to_text());
        let n = self.binds.len();
        match self.types.get(column) {
            Some(ty) => format!("CAST(${n} AS {ty})"),
            None => format!("${n}"),
        }
    }

    fn key_predicate(&mut self, key: &UniqueKey) -> String {
        key.persist_values()
            .iter()
            .map(|(k, v)| format!("{} = {}", quote_ident(k), self.push(k, v)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            binds: self.binds,
        }
    }
}

/// `SELECT` of `columns` (each read back as text) for at most one row.
pub(crate) fn select_sql(
    table: &str,
    columns: &[String],
    key: &UniqueKey,
    types: &ColumnTypes,
) -> SqlStatement {
    let cols = columns
        .iter()
        .map(|c| {
            let q = quote_ident(c);
            format!("{q}::text AS {q}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut p = Params::new(types);
    let predicate = p.key_predicate(key);
    let sql = format!(
        "SELECT {cols} FROM {} WHERE {predicate} LIMIT 1",
        quote_ident(table)
    );
    p.finish(sql)
}

pub(crate) fn insert_sql(table: &str, fields: &[FieldWrite], types: &ColumnTypes) -> SqlStatement {
    let mut p = Params::new(types);
    let names = fields
        .iter()
        .map(|w| quote_ident(&w.field))
        .collect::<Vec<_>>()
        .join(", ");
    let values = fields
        .iter()
        .map(|w| p.push(&w.field, &w.value))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({names}) VALUES ({values})",
        quote_ident(table)
    );
    p.finish(sql)
}

pub(crate) fn update_sql(
    table: &str,
    fields: &[FieldWrite],
    key: &UniqueKey,
    types: &ColumnTypes,
) -> SqlStatement {
    let mut p = Params::new(types);
    let sets = fields
        .iter()
        .map(|w| format!("{} = {}", quote_ident(&w.field), p.push(&w.field, &w.value)))
        .collect::<Vec<_>>()
        .join(", ");
    let predicate = p.key_predicate(key);
    let sql = format!("UPDATE {} SET {sets} WHERE {predicate}", quote_ident(table));
    p.finish(sql)
}

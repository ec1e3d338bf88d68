//! rusqlite-backed [`Store`] implementation.
//!
//! SQLite has no async API, so every method here does its work
//! synchronously while holding the connection mutex; the `async fn`s exist
//! only so callers compose against the `Store` trait uniformly. A
//! transaction is a `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` issued on the
//! same shared connection rather than rusqlite's borrowing `Transaction<'_>`
//! type, which can't be held across an owned, `Send` async boundary.

use std::path::Path as FsPath;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::model::Value;
use crate::{Error, Result};

use super::{Store, StoreRows};

/// Marker transaction handle. The real BEGIN/COMMIT/ROLLBACK state lives on
/// the connection itself.
pub struct SqliteTx {
    active: bool,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(store_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(store_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::StorageError(e.to_string())
}

/// Bind a [`Value`] as a rusqlite parameter. Lists/maps are JSON-encoded;
/// graph types never appear as bind parameters in emitted SQL.
fn to_sql_value(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::List(_) | Value::Map(_) => SqlValue::Text(v.to_json().to_string()),
        Value::Node(_) | Value::Relationship(_) | Value::Path(_) => {
            SqlValue::Text(v.to_json().to_string())
        }
    }
}

/// Decode one result-set cell. Text cells get the JSON-native-accessor
/// heuristic applied so that values read through `->` preserve their
/// original type (`true`/`false` stay boolean, quoted strings stay strings,
/// arrays/objects decode as `List`/`Map`) while plain text columns
/// (`label`, `type`, `id`) pass through unchanged.
fn json_cell_to_value(value_ref: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            decode_text_cell(&text)
        }
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn decode_text_cell(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        if let Ok(serde_json::Value::String(s)) = serde_json::from_str::<serde_json::Value>(text) {
            return Value::String(s);
        }
    }
    if (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('{') && text.ends_with('}'))
    {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(text) {
            return Value::from_json(parsed);
        }
    }
    Value::String(text.to_string())
}

#[async_trait]
impl Store for SqliteStore {
    type Tx = SqliteTx;

    async fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}'
            );
            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                source_id TEXT NOT NULL REFERENCES nodes(id),
                target_id TEXT NOT NULL REFERENCES nodes(id),
                properties TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);
            CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(type);
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
            "#,
        )
        .map_err(store_err)
    }

    async fn begin_tx(&self) -> Result<Self::Tx> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE").map_err(store_err)?;
        Ok(SqliteTx { active: true })
    }

    async fn execute(&self, tx: &mut Self::Tx, sql: &str, params: &[Value]) -> Result<StoreRows> {
        if !tx.active {
            return Err(Error::TxError("transaction already closed".into()));
        }
        let conn = self.conn.lock();
        let bound: Vec<rusqlite::types::Value> = params.iter().map(to_sql_value).collect();
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            bound.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

        tracing::debug!(sql, binds = param_refs.len(), "executing statement");

        let mut stmt = conn.prepare(sql).map_err(store_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        if columns.is_empty() {
            let changes = stmt.execute(param_refs.as_slice()).map_err(store_err)?;
            return Ok(StoreRows { columns, rows: Vec::new(), changes });
        }

        let ncols = columns.len();
        let mut rows_out = Vec::new();
        let mut rows = stmt.query(param_refs.as_slice()).map_err(store_err)?;
        while let Some(row) = rows.next().map_err(store_err)? {
            let mut out_row = Vec::with_capacity(ncols);
            for i in 0..ncols {
                let cell = row.get_ref(i).map_err(store_err)?;
                out_row.push(json_cell_to_value(cell));
            }
            rows_out.push(out_row);
        }
        let changes = conn.changes() as usize;
        Ok(StoreRows { columns, rows: rows_out, changes })
    }

    async fn commit_tx(&self, mut tx: Self::Tx) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("COMMIT").map_err(store_err)?;
        tx.active = false;
        Ok(())
    }

    async fn rollback_tx(&self, mut tx: Self::Tx) -> Result<()> {
        tracing::warn!("rolling back transaction");
        let conn = self.conn.lock();
        conn.execute_batch("ROLLBACK").map_err(store_err)?;
        tx.active = false;
        Ok(())
    }
}

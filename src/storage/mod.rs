//! # Store interface
//!
//! The narrow capability set the translator/executor depend on: run
//! parameterised SQL inside a transaction and report affected-row counts.
//! Schema, indexing and connection pooling live entirely on the
//! implementation side of this trait — the query core only ever sees
//! `execute`/`begin_tx`/`commit_tx`/`rollback_tx`/`initialize`.

pub mod sqlite;

use async_trait::async_trait;

use crate::model::Value;
use crate::Result;

pub use sqlite::SqliteStore;

/// Result of running one SQL statement.
#[derive(Debug, Default, Clone)]
pub struct StoreRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows affected by an INSERT/UPDATE/DELETE (SQLite's `changes()`).
    pub changes: usize,
}

/// A relational engine with JSON support, consumed through this narrow
/// capability set. Implementations own schema, indexing, connection
/// pooling and thread-safety; the query core only calls these five
/// methods.
#[async_trait]
pub trait Store: Send + Sync {
    /// A transaction handle. Implementations may make this a marker type
    /// and track the actual BEGIN/COMMIT state on the shared connection.
    type Tx: Send;

    /// Idempotently create `nodes`/`edges` tables, their indexes, and
    /// referential-integrity enforcement. Safe to call on every startup.
    async fn initialize(&self) -> Result<()>;

    /// Begin a transaction. All statements executed against the returned
    /// handle are part of one transactional unit.
    async fn begin_tx(&self) -> Result<Self::Tx>;

    /// Run one parameterised SQL statement inside `tx`, returning any
    /// result rows plus the affected-row count.
    async fn execute(&self, tx: &mut Self::Tx, sql: &str, params: &[Value]) -> Result<StoreRows>;

    /// Commit. Every mutation in the transaction lands, or none does.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back. Called on any store error encountered mid-plan.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;
}

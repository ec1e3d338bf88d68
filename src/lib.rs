//! # neo4j-rs — a Cypher query engine over a relational JSON store
//!
//! Parses a Cypher subset, translates it into parameterised SQL against a
//! `nodes`/`edges` schema, and executes it inside one transaction per call.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use neo4j_rs::{Graph, PropertyMap, Value};
//!
//! # async fn example() -> neo4j_rs::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let mut params = PropertyMap::new();
//! params.insert("name".into(), Value::from("Ada"));
//! let result = graph.execute("CREATE (n:Person {name: $name}) RETURN n", params).await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod execution;
pub mod model;
pub mod cypher;
pub mod planner;
pub mod storage;

pub use model::{Direction, Node, NodeId, Path, PropertyMap, RelId, Relationship, Value};
pub use storage::{SqliteStore, Store, StoreRows};

use std::collections::HashMap;
use std::time::Instant;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cypher syntax error at position {position}: {message}")]
    SyntaxError { position: usize, line: usize, column: usize, message: String },

    #[error("Semantic error: {0}")]
    SemanticError(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Planning error: {0}")]
    PlanError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// ExecutionResult — the one shape every `execute` call returns
// ============================================================================

/// One output row, keyed by projection name.
pub type ResultRow = HashMap<String, Value>;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMeta {
    pub count: usize,
    pub time_ms: u128,
    /// Rows affected by mutating statements (CREATE/MERGE/SET/REMOVE/DELETE)
    /// across the whole query. Not part of the minimal result contract but
    /// cheap to surface and useful to callers of write queries.
    pub changes: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// `execute` never returns `Err` — every failure mode (parse, translate,
/// store) is captured here instead, matching the library/HTTP contract.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Vec<ResultRow>,
    pub meta: ExecutionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionErrorInfo>,
}

impl ExecutionResult {
    fn ok(data: Vec<ResultRow>, changes: usize, started: Instant) -> Self {
        Self {
            meta: ExecutionMeta { count: data.len(), time_ms: started.elapsed().as_millis(), changes },
            data,
            success: true,
            error: None,
        }
    }

    fn err(e: Error, started: Instant) -> Self {
        let info = match &e {
            Error::SyntaxError { position, line, column, message } => ExecutionErrorInfo {
                message: message.clone(),
                position: Some(*position),
                line: Some(*line),
                column: Some(*column),
            },
            other => ExecutionErrorInfo { message: other.to_string(), position: None, line: None, column: None },
        };
        Self {
            success: false,
            data: Vec::new(),
            meta: ExecutionMeta { count: 0, time_ms: started.elapsed().as_millis(), changes: 0 },
            error: Some(info),
        }
    }
}

// ============================================================================
// Graph — the library entry point
// ============================================================================

/// A Cypher-queryable graph backed by a [`Store`].
pub struct Graph<B: Store> {
    store: B,
}

impl<B: Store> Graph<B> {
    pub fn with_store(store: B) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    /// Run one Cypher statement to completion: parse, translate, execute
    /// every clause inside a single transaction, commit or roll back. Never
    /// propagates an `Err` — failures are reported inside the result.
    pub async fn execute<P>(&self, query: &str, params: P) -> ExecutionResult
    where
        P: Into<PropertyMap>,
    {
        let started = Instant::now();
        match self.run(query, params.into()).await {
            Ok((rows, changes)) => ExecutionResult::ok(rows, changes, started),
            Err(e) => ExecutionResult::err(e, started),
        }
    }

    async fn run(&self, query: &str, params: PropertyMap) -> Result<(Vec<ResultRow>, usize)> {
        tracing::trace!(query, "parsing statement");
        let ast = cypher::parse(query)?;

        let mut tx = self.store.begin_tx().await?;
        match execution::execute_statement(&self.store, &mut tx, &ast, &params).await {
            Ok(output) => {
                self.store.commit_tx(tx).await?;
                Ok((output.rows, output.changes))
            }
            Err(e) => {
                self.store.rollback_tx(tx).await?;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Convenience facade (spec.md §6): each method builds and runs the
    // equivalent Cypher text rather than bypassing the query core.
    // ------------------------------------------------------------------

    pub async fn create_node<P>(&self, label: &str, properties: P) -> ExecutionResult
    where
        P: Into<PropertyMap>,
    {
        let properties = properties.into();
        let map = property_map_literal(&properties);
        let query = format!("CREATE (n:{label} {map}) RETURN n");
        self.execute(&query, properties).await
    }

    pub async fn create_edge<P>(&self, from_id: &str, to_id: &str, rel_type: &str, properties: P) -> ExecutionResult
    where
        P: Into<PropertyMap>,
    {
        let mut properties = properties.into();
        let map = property_map_literal(&properties);
        properties.insert("__from_id".into(), Value::String(from_id.to_string()));
        properties.insert("__to_id".into(), Value::String(to_id.to_string()));
        let query = format!(
            "MATCH (a), (b) WHERE id(a) = $__from_id AND id(b) = $__to_id \
             CREATE (a)-[r:{rel_type} {map}]->(b) RETURN r"
        );
        self.execute(&query, properties).await
    }

    pub async fn get_node(&self, id: &str) -> ExecutionResult {
        let mut params = PropertyMap::new();
        params.insert("__id".into(), Value::String(id.to_string()));
        self.execute("MATCH (n) WHERE id(n) = $__id RETURN n", params).await
    }

    pub async fn update_node<P>(&self, id: &str, properties: P) -> ExecutionResult
    where
        P: Into<PropertyMap>,
    {
        let mut properties = properties.into();
        let mut keys: Vec<&String> = properties.keys().collect();
        keys.sort();
        if keys.is_empty() {
            return self.get_node(id).await;
        }
        let assignments: Vec<String> = keys.iter().map(|k| format!("n.{k} = ${k}")).collect();
        properties.insert("__id".into(), Value::String(id.to_string()));
        let query = format!("MATCH (n) WHERE id(n) = $__id SET {} RETURN n", assignments.join(", "));
        self.execute(&query, properties).await
    }

    pub async fn delete_node(&self, id: &str) -> ExecutionResult {
        let mut params = PropertyMap::new();
        params.insert("__id".into(), Value::String(id.to_string()));
        self.execute("MATCH (n) WHERE id(n) = $__id DELETE n", params).await
    }
}

impl Graph<SqliteStore> {
    /// Open (or create) a file-backed graph.
    pub async fn open_sqlite(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        store.initialize().await?;
        Ok(Self::with_store(store))
    }

    /// An in-memory graph for testing and embedding. Still goes through the
    /// same SQL/`Store` path as `open_sqlite` — SQLite's `:memory:` mode is
    /// the backing store, not a separate in-Rust graph engine.
    pub async fn open_memory() -> Result<Self> {
        let store = SqliteStore::open_in_memory()?;
        store.initialize().await?;
        Ok(Self::with_store(store))
    }
}

fn property_map_literal(properties: &PropertyMap) -> String {
    let mut keys: Vec<&String> = properties.keys().collect();
    keys.sort();
    let parts: Vec<String> = keys.iter().map(|k| format!("{k}: ${k}")).collect();
    format!("{{{}}}", parts.join(", "))
}

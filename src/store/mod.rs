//! Business data store backing the `schema` and `execute` tools.
//!
//! Wraps a single SQLite connection behind a mutex so one store can be
//! shared read-only across concurrent conversations. The orchestration
//! layer screens out mutating statements before anything reaches
//! [`BusinessStore::select`]; the store itself stays a thin, faithful
//! window onto the engine.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::Value;

use crate::error::StoreError;

/// Result set from a read-only query.
///
/// Rows carry JSON values so tool results can be serialized straight into
/// the transcript without an intermediate row type.
#[derive(Debug, Clone)]
pub struct QueryRows {
    /// Column names in select order.
    pub columns: Vec<String>,
    /// All result rows (the tool layer truncates for previews).
    pub rows: Vec<Vec<Value>>,
}

/// The target data store for generated queries.
///
/// Holds one connection for the process lifetime; concurrent read-only
/// statements are serialized through the internal mutex because
/// `rusqlite::Connection` is not `Sync`.
pub struct BusinessStore {
    conn: Mutex<Connection>,
}

impl BusinessStore {
    /// Opens a store backed by a database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Executes a SQL script (DDL plus seed data).
    ///
    /// Bootstrap convenience for the CLI and tests; the conversation
    /// pipeline itself never calls this.
    pub fn run_script(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Reads and executes a SQL script file.
    pub fn run_script_file(&self, path: &Path) -> Result<(), StoreError> {
        let sql = std::fs::read_to_string(path).map_err(|source| StoreError::Script {
            path: path.display().to_string(),
            source,
        })?;
        self.run_script(&sql)
    }

    /// Static identifier of the query engine and version.
    #[must_use]
    pub fn engine_info() -> String {
        format!("SQLite v{}", rusqlite::version())
    }

    /// Concatenated data-definition statements of all tables.
    pub fn schema(&self) -> Result<String, StoreError> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT sql FROM sqlite_master WHERE type = 'table' AND sql IS NOT NULL")?;
        let ddl: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        Ok(ddl.join("\n"))
    }

    /// Runs a query and returns every row.
    ///
    /// Callers are responsible for having screened the statement; any
    /// engine-level failure (malformed SQL, missing table) is returned as
    /// an error value, never raised further.
    pub fn select(&self, query: &str) -> Result<QueryRows, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw = stmt.query([])?;
        while let Some(row) = raw.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(json_value(row.get_ref(idx)?));
            }
            rows.push(values);
        }

        Ok(QueryRows { columns, rows })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BusinessStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessStore").finish_non_exhaustive()
    }
}

/// Converts a SQLite value to JSON for transcript payloads.
fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(String::from_utf8_lossy(b).into_owned()),
    }
}

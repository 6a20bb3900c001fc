//! Engine abstraction and its SQLite implementation.
//!
//! The catalog and the table handles only talk to the database through
//! [`Engine`]: listing stored relations, executing statements, reading
//! back result rows and controlling transactions. [`SqliteEngine`] is the
//! `rusqlite` implementation.
//!
//! Results are buffered: [`Engine::execute`] runs a statement to completion
//! and keeps any rows it produced until they are read with
//! [`Engine::fetch_one`] or [`Engine::fetch_all`], or until the next
//! statement replaces them.
//!
//! # Example
//!
//! ```
//! use sew_sqlite::{DatabaseConfig, Engine, SqliteEngine, Value};
//!
//! let mut engine = SqliteEngine::open_in_memory(&DatabaseConfig::default()).unwrap();
//! engine.execute("create table t(a INTEGER)", &[]).unwrap();
//! engine.execute("insert into t values(?)", &[Value::Integer(7)]).unwrap();
//! engine.commit().unwrap();
//!
//! engine.execute("select a from t", &[]).unwrap();
//! let row = engine.fetch_one().unwrap().unwrap();
//! assert_eq!(row.get_by_name("a"), Some(&Value::Integer(7)));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use sew_core::statement::enclose_table_name;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Result, SewError};

/// Kind of stored relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Table,
    View,
}

impl RelationKind {
    fn from_master_type(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(Self::Table),
            "view" => Some(Self::View),
            _ => None,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => f.write_str("table"),
            Self::View => f.write_str("view"),
        }
    }
}

/// A stored relation and the definition text the engine keeps for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub definition: String,
    pub kind: RelationKind,
}

/// One fetched result row.
///
/// Values are addressable by position and by column name. Rows from the
/// same statement share their column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column named `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Like [`get_by_name`](Self::get_by_name), failing with
    /// [`SewError::ColumnNotFound`].
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get_by_name(name)
            .ok_or_else(|| SewError::ColumnNotFound(name.to_string()))
    }
}

/// Database engine operations used by the catalog and the handles.
pub trait Engine {
    /// Lists stored relations of the requested kinds, in storage order.
    fn list_relations(&mut self, kinds: &[RelationKind]) -> Result<Vec<Relation>>;

    /// Executes one statement with positional parameters.
    ///
    /// Rows produced by the statement are buffered for `fetch_*`. Returns
    /// the number of rows changed (zero for queries).
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Executes one statement once per parameter row.
    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize>;

    /// Next buffered row of the last statement, if any.
    fn fetch_one(&mut self) -> Result<Option<Row>>;

    /// All remaining buffered rows of the last statement.
    fn fetch_all(&mut self) -> Result<Vec<Row>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Opens a named savepoint, starting a transaction if none is open.
    fn savepoint(&mut self, name: &str) -> Result<()>;

    /// Releases a savepoint, keeping its changes in the enclosing transaction.
    fn release(&mut self, name: &str) -> Result<()>;

    /// Undoes everything since the savepoint and discards it.
    fn rollback_to(&mut self, name: &str) -> Result<()>;
}

/// [`Engine`] over a `rusqlite` connection.
///
/// A transaction is opened lazily before the first statement that writes,
/// so several writes can share one commit.
pub struct SqliteEngine {
    conn: Connection,
    buffered: VecDeque<Row>,
}

impl SqliteEngine {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, config)
    }

    pub fn open_in_memory(config: &DatabaseConfig) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    /// Wraps an existing connection, applying `config`.
    pub fn with_connection(conn: Connection, config: &DatabaseConfig) -> Result<Self> {
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        if let Some(timeout) = config.busy_timeout() {
            conn.busy_timeout(timeout)?;
        }
        Ok(Self {
            conn,
            buffered: VecDeque::new(),
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin_if_needed(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            debug!("Opening transaction");
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl Engine for SqliteEngine {
    fn list_relations(&mut self, kinds: &[RelationKind]) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, sql, type FROM sqlite_master WHERE type IN ('table', 'view')",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut relations = Vec::new();
        for row in rows {
            let (name, sql, kind) = row?;
            // Engine-internal tables are not part of the user schema.
            if name.starts_with("sqlite_") {
                continue;
            }
            let (Some(definition), Some(kind)) = (sql, RelationKind::from_master_type(&kind))
            else {
                continue;
            };
            if kinds.contains(&kind) {
                relations.push(Relation {
                    name,
                    definition,
                    kind,
                });
            }
        }
        Ok(relations)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(sql, params = params.len(), "Executing statement");
        self.buffered.clear();

        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        if stmt.column_count() == 0 {
            return Ok(stmt.execute(params_from_iter(params.iter()))?);
        }

        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            self.buffered.push_back(Row::new(Arc::clone(&columns), values));
        }
        Ok(0)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize> {
        debug!(sql, rows = rows.len(), "Executing statement for each row");
        self.buffered.clear();

        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let mut changed = 0;
        for params in rows {
            changed += stmt.execute(params_from_iter(params.iter()))?;
        }
        Ok(changed)
    }

    fn fetch_one(&mut self) -> Result<Option<Row>> {
        Ok(self.buffered.pop_front())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.buffered.drain(..).collect())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            debug!("Committing transaction");
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            debug!("Rolling back transaction");
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.begin_if_needed()?;
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", enclose_table_name(name)))?;
        Ok(())
    }

    fn release(&mut self, name: &str) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE {}", enclose_table_name(name)))?;
        Ok(())
    }

    fn rollback_to(&mut self, name: &str) -> Result<()> {
        let name = enclose_table_name(name);
        self.conn
            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
        Ok(())
    }
}

//! Database facade tying an engine to its catalog.
//!
//! [`Database`] owns an [`Engine`] and the [`TableCatalog`] reflected from
//! it. Construction reloads the catalog; afterwards every schema change made
//! through the facade (or through a handle) keeps the catalog current.
//!
//! # Example
//!
//! ```
//! use sew_core::TableDescriptor;
//! use sew_sqlite::{CreateOptions, Database, InsertOptions, TableKind, Value};
//!
//! let mut db = Database::open_in_memory().unwrap();
//! let desc = TableDescriptor::builder()
//!     .column("id", "INTEGER")
//!     .column("val", "TEXT")
//!     .build()
//!     .unwrap();
//! db.create_table(desc, "parent", CreateOptions::default()).unwrap();
//!
//! let mut parent = db.table("parent").unwrap();
//! parent
//!     .insert_one(&[Value::Integer(1), Value::Text("a".into())], InsertOptions::default())
//!     .unwrap();
//! assert_eq!(parent.row(0).unwrap().unwrap().get(0), Some(&Value::Integer(1)));
//!
//! assert_eq!(db.kind_of("parent"), Some(TableKind::Ordinary));
//! ```

use std::path::Path;

use rusqlite::Connection;
use rusqlite::types::Value;
use sew_core::TableDescriptor;

use crate::catalog::{CreateOptions, DataTableOptions, TableCatalog, TableKind};
use crate::config::DatabaseConfig;
use crate::engine::{Engine, Row, SqliteEngine};
use crate::error::{Result, SewError};
use crate::relations::RelationshipIndex;
use crate::table::{DataTable, MetaTable, Table, TableHandle, View};

/// An engine plus the catalog reflected from it.
pub struct Database<E: Engine = SqliteEngine> {
    pub(crate) engine: E,
    pub(crate) catalog: TableCatalog,
    config: DatabaseConfig,
}

impl Database<SqliteEngine> {
    /// Opens (or creates) a database file with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the file cannot be opened, or
    /// [`SewError::ParseError`] if an existing table definition cannot be
    /// read back.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, DatabaseConfig::default())
    }

    /// Opens (or creates) a database file with `config` applied to the
    /// connection and to generated statements.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let engine = SqliteEngine::open(path, &config)?;
        Self::from_engine(engine, config)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the connection cannot be set up.
    pub fn open_in_memory() -> Result<Self> {
        let config = DatabaseConfig::default();
        let engine = SqliteEngine::open_in_memory(&config)?;
        Self::from_engine(engine, config)
    }

    /// The underlying `rusqlite` connection.
    pub fn connection(&self) -> &Connection {
        self.engine.connection()
    }
}

impl<E: Engine> Database<E> {
    /// Wraps an engine and reflects its catalog.
    ///
    /// # Errors
    ///
    /// Propagates any failure of [`TableCatalog::reload`].
    pub fn from_engine(mut engine: E, config: DatabaseConfig) -> Result<Self> {
        let mut catalog = TableCatalog::new(config.statement_options());
        catalog.reload(&mut engine)?;
        Ok(Self {
            engine,
            catalog,
            config,
        })
    }

    /// Configuration the database was opened with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Catalog of every table and view, kept in step with the engine.
    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Direct engine access. Schema changes made here are not seen by the
    /// catalog until [`reload`](Self::reload).
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Foreign-key edges between catalog tables.
    pub fn relationships(&self) -> &RelationshipIndex {
        self.catalog.relationships()
    }

    /// Table and view names in name order.
    pub fn table_names(&self) -> Vec<String> {
        self.catalog.names().map(String::from).collect()
    }

    /// Kind of the named entry, or `None` if the catalog has no such name.
    pub fn kind_of(&self, name: &str) -> Option<TableKind> {
        self.catalog.get(name).map(|e| e.table_kind())
    }

    /// Re-reads the catalog after out-of-band schema changes and returns the
    /// entry names found.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the schema cannot be listed, or
    /// [`SewError::ParseError`] for a definition outside the supported
    /// grammar.
    pub fn reload(&mut self) -> Result<Vec<String>> {
        self.catalog.reload(&mut self.engine)
    }

    /// Runs one statement with positional parameters. Result rows, if any,
    /// are buffered for [`fetch_one`](Self::fetch_one) and
    /// [`fetch_all`](Self::fetch_all).
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the statement fails.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.engine.execute(sql, params)
    }

    /// Runs one statement once per parameter row.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] on the first failing row.
    pub fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize> {
        self.engine.execute_many(sql, rows)
    }

    /// Takes the next buffered result row.
    ///
    /// # Errors
    ///
    /// Returns an engine error only if the engine cannot hand rows back.
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.engine.fetch_one()
    }

    /// Takes every remaining buffered result row.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_one`](Self::fetch_one).
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.engine.fetch_all()
    }

    /// Commits the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the commit fails.
    pub fn commit(&mut self) -> Result<()> {
        self.engine.commit()
    }

    /// Rolls back the open transaction, if any.
    ///
    /// The catalog is not reverted; call [`reload`](Self::reload) after
    /// rolling back schema changes.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the rollback fails.
    pub fn rollback(&mut self) -> Result<()> {
        self.engine.rollback()
    }

    /// See [`TableCatalog::create_table`].
    pub fn create_table(
        &mut self,
        descriptor: TableDescriptor,
        name: &str,
        options: CreateOptions,
    ) -> Result<String> {
        self.catalog
            .create_table(&mut self.engine, descriptor, name, options)
    }

    /// See [`TableCatalog::create_meta_table`].
    pub fn create_meta_table(
        &mut self,
        descriptor: TableDescriptor,
        name: &str,
        options: CreateOptions,
    ) -> Result<String> {
        self.catalog
            .create_meta_table(&mut self.engine, descriptor, name, options)
    }

    /// See [`TableCatalog::create_data_table`].
    pub fn create_data_table(
        &mut self,
        descriptor: TableDescriptor,
        name: &str,
        metadata: &[Value],
        meta_table: &str,
        options: DataTableOptions,
    ) -> Result<String> {
        self.catalog.create_data_table(
            &mut self.engine,
            descriptor,
            name,
            metadata,
            meta_table,
            options,
        )
    }

    /// See [`TableCatalog::drop_table`].
    pub fn drop_table(&mut self, name: &str, commit_now: bool) -> Result<String> {
        self.catalog.drop_table(&mut self.engine, name, commit_now)
    }

    /// Handle for any catalog entry, tagged by kind.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] for an unknown name.
    pub fn handle(&mut self, name: &str) -> Result<TableHandle<'_, E>> {
        match self.require_kind(name)? {
            TableKind::View => Ok(TableHandle::View(View::new(self, name))),
            TableKind::Ordinary => Ok(TableHandle::Ordinary(Table::new(self, name)?)),
            TableKind::MetaTable => Ok(TableHandle::MetaTable(MetaTable::new(Table::new(
                self, name,
            )?))),
            TableKind::DataTable => Ok(TableHandle::DataTable(DataTable::new(Table::new(
                self, name,
            )?)?)),
        }
    }

    /// Table handle for any non-view entry.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] for an unknown name and
    /// [`SewError::WrongTableKind`] for a view.
    pub fn table(&mut self, name: &str) -> Result<Table<'_, E>> {
        match self.require_kind(name)? {
            TableKind::View => Err(self.wrong_kind(name, TableKind::Ordinary)),
            _ => Table::new(self, name),
        }
    }

    /// Handle for a view.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] or [`SewError::WrongTableKind`].
    pub fn view(&mut self, name: &str) -> Result<View<'_, E>> {
        match self.require_kind(name)? {
            TableKind::View => Ok(View::new(self, name)),
            _ => Err(self.wrong_kind(name, TableKind::View)),
        }
    }

    /// Handle for a metadata table.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] or [`SewError::WrongTableKind`].
    pub fn meta_table(&mut self, name: &str) -> Result<MetaTable<'_, E>> {
        match self.require_kind(name)? {
            TableKind::MetaTable => Ok(MetaTable::new(Table::new(self, name)?)),
            _ => Err(self.wrong_kind(name, TableKind::MetaTable)),
        }
    }

    /// Handle for a data table.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] or [`SewError::WrongTableKind`].
    pub fn data_table(&mut self, name: &str) -> Result<DataTable<'_, E>> {
        match self.require_kind(name)? {
            TableKind::DataTable => DataTable::new(Table::new(self, name)?),
            _ => Err(self.wrong_kind(name, TableKind::DataTable)),
        }
    }

    fn require_kind(&self, name: &str) -> Result<TableKind> {
        self.kind_of(name)
            .ok_or_else(|| SewError::TableNotFound(name.to_string()))
    }

    fn wrong_kind(&self, name: &str, expected: TableKind) -> SewError {
        match self.kind_of(name) {
            Some(actual) => SewError::WrongTableKind {
                name: name.to_string(),
                expected,
                actual,
            },
            None => SewError::TableNotFound(name.to_string()),
        }
    }
}

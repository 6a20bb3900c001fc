//! Typed handles over catalog entries.
//!
//! A handle borrows the [`Database`] mutably for its lifetime and carries a
//! snapshot of its table's descriptor. Results of `select`-style calls are
//! read back with [`Table::fetch_one`] / [`Table::fetch_all`].
//!
//! - [`Table`]: selects, inserts, deletes, views, ALTER TABLE and
//!   parent-row lookup through foreign keys.
//! - [`View`]: select only.
//! - [`MetaTable`] / [`DataTable`]: a [`Table`] plus the metadata pairing.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use rusqlite::types::Value;
use sew_core::statement::{
    SelectQuery, StatementOptions, delete_sql, insert_named_sql, insert_sql, quote_identifier,
    select_sql,
};
use sew_core::{ColumnDescriptor, ColumnSet, Condition, DATA_TABLE_COLUMN, TableDescriptor};
use tracing::debug;

use crate::catalog::{CreateOptions, EntryKind, TableKind};
use crate::database::Database;
use crate::engine::{Engine, Row};
use crate::error::{Result, SewError};

/// Options for inserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// `insert or replace`
    pub or_replace: bool,
    pub commit_now: bool,
}

/// Handle for a table of any non-view kind.
pub struct Table<'a, E: Engine> {
    db: &'a mut Database<E>,
    name: String,
    descriptor: Arc<TableDescriptor>,
}

impl<'a, E: Engine> Table<'a, E> {
    pub(crate) fn new(db: &'a mut Database<E>, name: &str) -> Result<Self> {
        let entry = db
            .catalog
            .get(name)
            .ok_or_else(|| SewError::TableNotFound(name.to_string()))?;
        let descriptor = entry
            .descriptor()
            .cloned()
            .ok_or_else(|| SewError::WrongTableKind {
                name: name.to_string(),
                expected: TableKind::Ordinary,
                actual: entry.table_kind(),
            })?;
        Ok(Self {
            db,
            name: name.to_string(),
            descriptor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Column handles for this table.
    pub fn columns(&self) -> ColumnSet {
        ColumnSet::from_descriptor(&self.name, &self.descriptor)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.descriptor.column_names()
    }

    /// Runs a select; read the rows with [`fetch_one`](Self::fetch_one) or
    /// [`fetch_all`](Self::fetch_all). Returns the executed statement.
    pub fn select(&mut self, query: &SelectQuery) -> Result<String> {
        self.select_with_params(query, &[])
    }

    /// Like [`select`](Self::select), binding `?` placeholders in the
    /// query's conditions.
    pub fn select_with_params(&mut self, query: &SelectQuery, params: &[Value]) -> Result<String> {
        let sql = select_sql(&self.name, query, &self.options());
        self.db.engine.execute(&sql, params)?;
        Ok(sql)
    }

    /// Row at position `index`, in storage order.
    pub fn row(&mut self, index: u64) -> Result<Option<Row>> {
        self.select(&SelectQuery::all().limit(1).offset(index))?;
        self.db.engine.fetch_one()
    }

    /// Rows in positions `start..end`.
    pub fn rows(&mut self, start: u64, end: u64) -> Result<Vec<Row>> {
        if end <= start {
            return Ok(Vec::new());
        }
        self.select(&SelectQuery::all().limit(end - start).offset(start))?;
        self.db.engine.fetch_all()
    }

    /// Inserts one full row (one value per column, in column order).
    pub fn insert_one(&mut self, values: &[Value], options: InsertOptions) -> Result<String> {
        let sql = insert_sql(&self.name, values.len(), options.or_replace, &self.options());
        self.db.engine.execute(&sql, values)?;
        self.finish_write(options.commit_now)?;
        Ok(sql)
    }

    /// Inserts one row into the named columns.
    pub fn insert_named(
        &mut self,
        columns: &[&str],
        values: &[Value],
        options: InsertOptions,
    ) -> Result<String> {
        self.require_columns(columns)?;
        let sql = insert_named_sql(&self.name, columns, options.or_replace, &self.options());
        self.db.engine.execute(&sql, values)?;
        self.finish_write(options.commit_now)?;
        Ok(sql)
    }

    /// Inserts several full rows with one prepared statement.
    pub fn insert_many(&mut self, rows: &[Vec<Value>], options: InsertOptions) -> Result<String> {
        let sql = insert_sql(
            &self.name,
            self.descriptor.columns().len(),
            options.or_replace,
            &self.options(),
        );
        self.db.engine.execute_many(&sql, rows)?;
        self.finish_write(options.commit_now)?;
        Ok(sql)
    }

    /// Inserts several rows into the named columns.
    pub fn insert_many_named(
        &mut self,
        columns: &[&str],
        rows: &[Vec<Value>],
        options: InsertOptions,
    ) -> Result<String> {
        self.require_columns(columns)?;
        let sql = insert_named_sql(&self.name, columns, options.or_replace, &self.options());
        self.db.engine.execute_many(&sql, rows)?;
        self.finish_write(options.commit_now)?;
        Ok(sql)
    }

    /// Deletes every row matching all `conditions`.
    pub fn delete(&mut self, conditions: &[Condition], commit_now: bool) -> Result<String> {
        let sql = delete_sql(&self.name, conditions, &self.options());
        self.db.engine.execute(&sql, &[])?;
        self.finish_write(commit_now)?;
        Ok(sql)
    }

    /// Creates a view selecting from this table, named `<table>_view`
    /// unless `view_name` is given.
    pub fn create_view(
        &mut self,
        query: &SelectQuery,
        view_name: Option<&str>,
        options: CreateOptions,
    ) -> Result<String> {
        self.db
            .catalog
            .create_view(&mut self.db.engine, &self.name, query, view_name, options)
    }

    /// Adds a column and refreshes this handle's descriptor.
    pub fn add_column(&mut self, column: ColumnDescriptor, commit_now: bool) -> Result<String> {
        let sql = self
            .db
            .catalog
            .add_column(&mut self.db.engine, &self.name, column, commit_now)?;
        self.refresh_descriptor();
        Ok(sql)
    }

    /// Drops a column and refreshes this handle's descriptor.
    pub fn drop_column(&mut self, column: &str, commit_now: bool) -> Result<String> {
        let sql = self
            .db
            .catalog
            .drop_column(&mut self.db.engine, &self.name, column, commit_now)?;
        self.refresh_descriptor();
        Ok(sql)
    }

    /// Fetches the parent row referenced by `row` through a foreign key.
    ///
    /// Uses the foreign key declared on `foreign_key` (a child column), or
    /// the table's first foreign key when `None`. The child value is bound
    /// as a parameter.
    ///
    /// # Errors
    ///
    /// [`SewError::ForeignKeyNotFound`] for an unknown child column,
    /// [`SewError::NoForeignKeys`] if the table has none, and
    /// [`SewError::ColumnNotFound`] if `row` lacks the child column.
    pub fn retrieve_parent_row(
        &mut self,
        row: &Row,
        foreign_key: Option<&str>,
    ) -> Result<Option<Row>> {
        let fk = match foreign_key {
            Some(column) => self.descriptor.foreign_key(column).ok_or_else(|| {
                SewError::ForeignKeyNotFound {
                    table: self.name.clone(),
                    column: column.to_string(),
                }
            })?,
            None => self
                .descriptor
                .foreign_keys()
                .first()
                .ok_or_else(|| SewError::NoForeignKeys(self.name.clone()))?,
        }
        .clone();
        let value = row.value(&fk.child_column)?.clone();

        let parent_column = quote_identifier(&fk.parent_column).into_owned();
        let query = SelectQuery::all().filter(Condition::new(parent_column).eq("?"));
        let sql = select_sql(&fk.parent_table, &query, &self.options());
        debug!(table = %self.name, parent = %fk.parent_table, "Retrieving parent row");
        self.db.engine.execute(&sql, &[value])?;
        self.db.engine.fetch_one()
    }

    /// Next row of the last [`select`](Self::select).
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.db.engine.fetch_one()
    }

    /// Remaining rows of the last [`select`](Self::select).
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.db.engine.fetch_all()
    }

    fn options(&self) -> StatementOptions {
        *self.db.catalog.statement_options()
    }

    fn finish_write(&mut self, commit_now: bool) -> Result<()> {
        if commit_now {
            self.db.engine.commit()?;
        }
        Ok(())
    }

    fn require_columns(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.descriptor.contains_column(c)) {
            Some(missing) => Err(SewError::ColumnNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    fn refresh_descriptor(&mut self) {
        if let Some(descriptor) = self.db.catalog.get(&self.name).and_then(|e| e.descriptor()) {
            self.descriptor = Arc::clone(descriptor);
        }
    }
}

/// Handle for a view.
pub struct View<'a, E: Engine> {
    db: &'a mut Database<E>,
    name: String,
}

impl<'a, E: Engine> View<'a, E> {
    pub(crate) fn new(db: &'a mut Database<E>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a select against the view and returns the SQL used.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::EngineError`] if the engine rejects the query.
    pub fn select(&mut self, query: &SelectQuery) -> Result<String> {
        self.select_with_params(query, &[])
    }

    /// Like [`select`](Self::select), binding `?` placeholders.
    pub fn select_with_params(&mut self, query: &SelectQuery, params: &[Value]) -> Result<String> {
        let sql = select_sql(&self.name, query, self.db.catalog.statement_options());
        self.db.engine.execute(&sql, params)?;
        Ok(sql)
    }

    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.db.engine.fetch_one()
    }

    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.db.engine.fetch_all()
    }
}

/// Handle for a metadata table.
pub struct MetaTable<'a, E: Engine> {
    table: Table<'a, E>,
}

impl<'a, E: Engine> MetaTable<'a, E> {
    pub(crate) fn new(table: Table<'a, E>) -> Self {
        Self { table }
    }

    /// The metadata row describing `data_table`.
    ///
    /// # Errors
    ///
    /// [`SewError::MetadataNotFound`] if no row names it.
    pub fn metadata_for(&mut self, data_table: &str) -> Result<Row> {
        metadata_row(&mut self.table, data_table)
    }

    /// Every data table name listed in this metadata table, queried live.
    pub fn data_tables(&mut self) -> Result<Vec<String>> {
        self.table.select(&SelectQuery::columns([DATA_TABLE_COLUMN]))?;
        let rows = self.table.fetch_all()?;
        Ok(rows
            .iter()
            .filter_map(|row| match row.get(0) {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Existing data tables the catalog links to this metadata table.
    pub fn linked_data_tables(&self) -> Vec<String> {
        match self.table.db.catalog.get(&self.table.name).map(|e| &e.kind) {
            Some(EntryKind::MetaTable { data_tables, .. }) => data_tables.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl<'a, E: Engine> Deref for MetaTable<'a, E> {
    type Target = Table<'a, E>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

impl<E: Engine> DerefMut for MetaTable<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.table
    }
}

/// Handle for a data table.
pub struct DataTable<'a, E: Engine> {
    table: Table<'a, E>,
    metadata_table: String,
}

impl<'a, E: Engine> DataTable<'a, E> {
    pub(crate) fn new(table: Table<'a, E>) -> Result<Self> {
        let metadata_table = match table.db.catalog.get(&table.name).map(|e| &e.kind) {
            Some(EntryKind::DataTable { metadata_table, .. }) => metadata_table.clone(),
            Some(kind) => {
                return Err(SewError::WrongTableKind {
                    name: table.name.clone(),
                    expected: TableKind::DataTable,
                    actual: kind.table_kind(),
                });
            }
            None => return Err(SewError::TableNotFound(table.name.clone())),
        };
        Ok(Self {
            table,
            metadata_table,
        })
    }

    pub fn metadata_table_name(&self) -> &str {
        &self.metadata_table
    }

    /// This table's row in its metadata table.
    pub fn metadata(&mut self) -> Result<Row> {
        let name = self.table.name.clone();
        let meta = self.metadata_table.clone();
        let sql = select_sql(
            &meta,
            &data_table_filter(),
            self.table.db.catalog.statement_options(),
        );
        self.table
            .db
            .engine
            .execute(&sql, &[Value::Text(name.clone())])?;
        self.table
            .db
            .engine
            .fetch_one()?
            .ok_or(SewError::MetadataNotFound {
                meta_table: meta,
                data_table: name,
            })
    }
}

impl<'a, E: Engine> Deref for DataTable<'a, E> {
    type Target = Table<'a, E>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

impl<E: Engine> DerefMut for DataTable<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.table
    }
}

/// Handle for any catalog entry.
pub enum TableHandle<'a, E: Engine> {
    Ordinary(Table<'a, E>),
    View(View<'a, E>),
    MetaTable(MetaTable<'a, E>),
    DataTable(DataTable<'a, E>),
}

impl<E: Engine> TableHandle<'_, E> {
    pub fn kind(&self) -> TableKind {
        match self {
            Self::Ordinary(_) => TableKind::Ordinary,
            Self::View(_) => TableKind::View,
            Self::MetaTable(_) => TableKind::MetaTable,
            Self::DataTable(_) => TableKind::DataTable,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Ordinary(table) => table.name(),
            Self::View(view) => view.name(),
            Self::MetaTable(meta) => meta.name(),
            Self::DataTable(data) => data.name(),
        }
    }
}

fn data_table_filter() -> SelectQuery {
    SelectQuery::all().filter(Condition::new(DATA_TABLE_COLUMN).eq("?"))
}

fn metadata_row<E: Engine>(meta: &mut Table<'_, E>, data_table: &str) -> Result<Row> {
    meta.select_with_params(&data_table_filter(), &[Value::Text(data_table.to_string())])?;
    meta.fetch_one()?.ok_or_else(|| SewError::MetadataNotFound {
        meta_table: meta.name.clone(),
        data_table: data_table.to_string(),
    })
}

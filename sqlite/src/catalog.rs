//! Live catalog of the tables and views in a database.
//!
//! [`TableCatalog`] reflects every stored relation, classifies it, and owns
//! the [`RelationshipIndex`] derived from the tables' foreign keys.
//!
//! # Classification
//!
//! - a view is a [`TableKind::View`];
//! - a table whose name ends in `_metadata` is a [`TableKind::MetaTable`]
//!   and must have a `data_tblname` column;
//! - a table named in some metadata table's `data_tblname` column is a
//!   [`TableKind::DataTable`] linked to that metadata table (the first one
//!   in name order if several name it);
//! - everything else is [`TableKind::Ordinary`].
//!
//! Every mutation leaves the catalog equal to what a fresh
//! [`reload`](TableCatalog::reload) would produce.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use rusqlite::types::Value;
use serde::Serialize;
use sew_core::statement::{
    SelectQuery, StatementOptions, alter_add_column_sql, alter_drop_column_sql, create_table_sql,
    create_view_sql, drop_table_sql, drop_view_sql, enclose_table_name, insert_named_sql,
    select_sql,
};
use sew_core::{
    ColumnDescriptor, DATA_TABLE_COLUMN, TableDescriptor, ValidationError, is_meta_table_name,
    parse_table_sql, validate_descriptor, validate_meta_table,
};
use tracing::{debug, info, warn};

use crate::engine::{Engine, RelationKind};
use crate::error::{Result, SewError};
use crate::relations::RelationshipIndex;

const DATA_TABLE_SAVEPOINT: &str = "sew_create_data_table";

/// Kind of a catalog entry, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Ordinary,
    View,
    MetaTable,
    DataTable,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ordinary => "table",
            Self::View => "view",
            Self::MetaTable => "metadata table",
            Self::DataTable => "data table",
        };
        f.write_str(name)
    }
}

/// Classified payload of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A table with no metadata role.
    Ordinary(Arc<TableDescriptor>),
    /// A view; its definition is not parsed.
    View,
    /// A `_metadata` table with a `data_tblname` column.
    MetaTable {
        descriptor: Arc<TableDescriptor>,
        /// Existing data tables linked to this metadata table.
        data_tables: BTreeSet<String>,
    },
    /// A table named by a row of some metadata table.
    DataTable {
        descriptor: Arc<TableDescriptor>,
        /// The metadata table whose row describes this table.
        metadata_table: String,
    },
}

impl EntryKind {
    /// Payload-free kind.
    pub fn table_kind(&self) -> TableKind {
        match self {
            Self::Ordinary(_) => TableKind::Ordinary,
            Self::View => TableKind::View,
            Self::MetaTable { .. } => TableKind::MetaTable,
            Self::DataTable { .. } => TableKind::DataTable,
        }
    }

    /// Descriptor of a table entry; `None` for views.
    pub fn descriptor(&self) -> Option<&Arc<TableDescriptor>> {
        match self {
            Self::Ordinary(descriptor)
            | Self::MetaTable { descriptor, .. }
            | Self::DataTable { descriptor, .. } => Some(descriptor),
            Self::View => None,
        }
    }
}

/// One table or view known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Table or view name as stored by the engine.
    pub name: String,
    /// Classification, carrying the parsed descriptor for tables.
    pub kind: EntryKind,
}

impl CatalogEntry {
    /// See [`EntryKind::table_kind`].
    pub fn table_kind(&self) -> TableKind {
        self.kind.table_kind()
    }

    /// See [`EntryKind::descriptor`].
    pub fn descriptor(&self) -> Option<&Arc<TableDescriptor>> {
        self.kind.descriptor()
    }
}

/// Options for `create table` and `create view`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Emit `if not exists`; an already-known entry is kept as is.
    pub if_not_exists: bool,
    /// Commit right after the statement.
    pub commit_now: bool,
}

/// Options for [`TableCatalog::create_data_table`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataTableOptions {
    pub if_not_exists: bool,
    /// Replace an existing metadata row for the same data table.
    pub or_replace: bool,
    pub commit_now: bool,
}

/// Classified tables and views plus the relationship index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCatalog {
    entries: BTreeMap<String, CatalogEntry>,
    /// Data table name to every metadata table whose rows name it.
    governance: BTreeMap<String, BTreeSet<String>>,
    relationships: RelationshipIndex,
    options: StatementOptions,
}

impl TableCatalog {
    /// Creates an empty catalog; call [`reload`](Self::reload) to fill it.
    pub fn new(options: StatementOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Re-reads every table and view from the engine.
    ///
    /// Returns the relation names in engine order. On error the previous
    /// catalog is kept unchanged.
    pub fn reload<E: Engine>(&mut self, engine: &mut E) -> Result<Vec<String>> {
        let relations = engine.list_relations(&[RelationKind::Table, RelationKind::View])?;

        let mut entries = BTreeMap::new();
        let mut governance: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut names = Vec::with_capacity(relations.len());

        for relation in relations {
            let kind = match relation.kind {
                RelationKind::View => EntryKind::View,
                RelationKind::Table => {
                    let descriptor = parse_table_sql(&relation.definition)
                        .map_err(|e| SewError::parse(&relation.name, e))?;
                    if is_meta_table_name(&relation.name) {
                        first_error(validate_meta_table(&relation.name, &descriptor))?;
                        for data_table in read_governed_names(engine, &relation.name)? {
                            governance
                                .entry(data_table)
                                .or_default()
                                .insert(relation.name.clone());
                        }
                        EntryKind::MetaTable {
                            descriptor: Arc::new(descriptor),
                            data_tables: BTreeSet::new(),
                        }
                    } else {
                        EntryKind::Ordinary(Arc::new(descriptor))
                    }
                }
            };
            debug!(table = %relation.name, kind = %kind.table_kind(), "Reflected relation");
            names.push(relation.name.clone());
            entries.insert(
                relation.name.clone(),
                CatalogEntry {
                    name: relation.name,
                    kind,
                },
            );
        }

        for (data_table, metas) in &governance {
            if metas.len() > 1 && entries.contains_key(data_table) {
                warn!(
                    table = %data_table,
                    metadata_tables = ?metas,
                    "Data table named by several metadata tables, linking to the first"
                );
            }
        }

        let mut fresh = Self {
            entries,
            governance,
            relationships: RelationshipIndex::new(),
            options: self.options,
        };
        fresh.relink();
        fresh.rebuild_relationships();

        info!(
            relations = names.len(),
            relationships = fresh.relationships.len(),
            "Reloaded catalog"
        );
        *self = fresh;
        Ok(names)
    }

    /// Creates a table from a descriptor and records it.
    ///
    /// Names ending in `_metadata` are validated and recorded as metadata
    /// tables; names already listed in a metadata table become data tables.
    /// Returns the executed statement.
    ///
    /// # Errors
    ///
    /// [`SewError::ValidationError`] before anything is executed, or the
    /// engine's error.
    pub fn create_table<E: Engine>(
        &mut self,
        engine: &mut E,
        descriptor: TableDescriptor,
        name: &str,
        options: CreateOptions,
    ) -> Result<String> {
        first_error(validate_descriptor(&descriptor))?;
        if is_meta_table_name(name) {
            first_error(validate_meta_table(name, &descriptor))?;
        }

        let sql = create_table_sql(&descriptor, name, options.if_not_exists, &self.options);
        engine.execute(&sql, &[])?;
        if options.commit_now {
            engine.commit()?;
        }

        if options.if_not_exists && self.entries.contains_key(name) {
            debug!(table = name, "Table already known, keeping entry");
        } else {
            self.insert_table(name, descriptor);
        }
        Ok(sql)
    }

    /// Creates a metadata table.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingMetaSuffix`] or
    /// [`ValidationError::MissingDataTableColumn`] before anything is
    /// executed.
    pub fn create_meta_table<E: Engine>(
        &mut self,
        engine: &mut E,
        descriptor: TableDescriptor,
        name: &str,
        options: CreateOptions,
    ) -> Result<String> {
        first_error(validate_meta_table(name, &descriptor))?;
        self.create_table(engine, descriptor, name, options)
    }

    /// Creates a data table and its metadata row in one step.
    ///
    /// `metadata` fills the metadata table's columns other than
    /// `data_tblname`, in declaration order. The row insert and the
    /// `create table` run inside a savepoint: if either fails, neither is
    /// kept.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMetaTable`] or
    /// [`ValidationError::MetadataArity`] before anything is executed, or
    /// the engine's error after the savepoint was rolled back.
    pub fn create_data_table<E: Engine>(
        &mut self,
        engine: &mut E,
        descriptor: TableDescriptor,
        name: &str,
        metadata: &[Value],
        meta_table: &str,
        options: DataTableOptions,
    ) -> Result<String> {
        let meta_descriptor = match self.entries.get(meta_table).map(|e| &e.kind) {
            Some(EntryKind::MetaTable { descriptor, .. }) => Arc::clone(descriptor),
            _ => return Err(ValidationError::UnknownMetaTable(meta_table.to_string()).into()),
        };
        let expected = meta_descriptor.columns().len();
        if metadata.len() + 1 != expected {
            return Err(ValidationError::MetadataArity {
                table: meta_table.to_string(),
                expected,
                actual: metadata.len() + 1,
            }
            .into());
        }
        first_error(validate_descriptor(&descriptor))?;

        let mut columns = vec![DATA_TABLE_COLUMN];
        columns.extend(
            meta_descriptor
                .column_names()
                .into_iter()
                .filter(|c| *c != DATA_TABLE_COLUMN),
        );
        let mut row = Vec::with_capacity(expected);
        row.push(Value::Text(name.to_string()));
        row.extend(metadata.iter().cloned());

        let insert = insert_named_sql(meta_table, &columns, options.or_replace, &self.options);
        let create = create_table_sql(&descriptor, name, options.if_not_exists, &self.options);

        engine.savepoint(DATA_TABLE_SAVEPOINT)?;
        let outcome = engine
            .execute(&insert, &row)
            .and_then(|_| engine.execute(&create, &[]));
        if let Err(err) = outcome {
            if let Err(rollback_err) = engine.rollback_to(DATA_TABLE_SAVEPOINT) {
                warn!(error = %rollback_err, "Failed to roll back data table creation");
            }
            return Err(err);
        }
        engine.release(DATA_TABLE_SAVEPOINT)?;
        if options.commit_now {
            engine.commit()?;
        }

        self.governance
            .entry(name.to_string())
            .or_default()
            .insert(meta_table.to_string());
        if options.if_not_exists && self.entries.contains_key(name) {
            self.relink();
        } else {
            self.insert_table(name, descriptor);
        }
        Ok(create)
    }

    /// Drops a table or view and forgets it.
    ///
    /// The dropped table's own foreign keys leave the relationship index.
    /// Dropping a metadata table turns its data tables back into ordinary
    /// tables; dropping a data table leaves its metadata row in place.
    pub fn drop_table<E: Engine>(
        &mut self,
        engine: &mut E,
        name: &str,
        commit_now: bool,
    ) -> Result<String> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SewError::TableNotFound(name.to_string()))?;
        let sql = match entry.kind {
            EntryKind::View => drop_view_sql(name, &self.options),
            _ => drop_table_sql(name, &self.options),
        };

        engine.execute(&sql, &[])?;
        if commit_now {
            engine.commit()?;
        }

        if let Some(removed) = self.entries.remove(name) {
            if removed.table_kind() == TableKind::MetaTable {
                self.governance.retain(|_, metas| {
                    metas.remove(name);
                    !metas.is_empty()
                });
            }
        }
        self.relationships.remove_child_table(name);
        self.relink();
        debug!(table = name, "Dropped relation");
        Ok(sql)
    }

    /// Creates a view over `table` and records it.
    ///
    /// The view is named `<table>_view` unless `view_name` is given.
    pub fn create_view<E: Engine>(
        &mut self,
        engine: &mut E,
        table: &str,
        query: &SelectQuery,
        view_name: Option<&str>,
        options: CreateOptions,
    ) -> Result<String> {
        if !self.entries.contains_key(table) {
            return Err(SewError::TableNotFound(table.to_string()));
        }
        let view_name = view_name.map_or_else(|| format!("{table}_view"), str::to_string);

        let select = select_sql(table, query, &self.options);
        let sql = create_view_sql(&select, &view_name, options.if_not_exists, &self.options);
        engine.execute(&sql, &[])?;
        if options.commit_now {
            engine.commit()?;
        }

        self.entries
            .entry(view_name.clone())
            .or_insert_with(|| CatalogEntry {
                name: view_name,
                kind: EntryKind::View,
            });
        Ok(sql)
    }

    /// `alter table ... add column`, then refreshes the table's descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::TableNotFound`] or [`SewError::WrongTableKind`]
    /// for a missing table or a view, and [`SewError::ValidationError`] for
    /// an empty, duplicate or malformed column, all before anything is
    /// executed.
    pub fn add_column<E: Engine>(
        &mut self,
        engine: &mut E,
        table: &str,
        column: ColumnDescriptor,
        commit_now: bool,
    ) -> Result<String> {
        let descriptor = self.table_descriptor(table)?;
        descriptor
            .to_builder()
            .column(column.name.clone(), column.raw_type.clone())
            .build()?;

        let sql = alter_add_column_sql(table, &column, &self.options);
        engine.execute(&sql, &[])?;
        if commit_now {
            engine.commit()?;
        }
        self.refresh_table(engine, table)?;
        Ok(sql)
    }

    /// `alter table ... drop column`, then refreshes the table's descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SewError::ColumnNotFound`] for an unknown column and
    /// [`SewError::ValidationError`] for a column still named by a unique
    /// group or foreign key, both before anything is executed.
    pub fn drop_column<E: Engine>(
        &mut self,
        engine: &mut E,
        table: &str,
        column: &str,
        commit_now: bool,
    ) -> Result<String> {
        let descriptor = self.table_descriptor(table)?;
        if !descriptor.contains_column(column) {
            return Err(SewError::ColumnNotFound(column.to_string()));
        }
        descriptor.to_builder().without_column(column).build()?;

        let sql = alter_drop_column_sql(table, column, &self.options);
        engine.execute(&sql, &[])?;
        if commit_now {
            engine.commit()?;
        }
        self.refresh_table(engine, table)?;
        Ok(sql)
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn relationships(&self) -> &RelationshipIndex {
        &self.relationships
    }

    /// Options every generated statement is rendered with.
    pub fn statement_options(&self) -> &StatementOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn table_descriptor(&self, table: &str) -> Result<Arc<TableDescriptor>> {
        let entry = self
            .entries
            .get(table)
            .ok_or_else(|| SewError::TableNotFound(table.to_string()))?;
        entry
            .descriptor()
            .cloned()
            .ok_or_else(|| SewError::WrongTableKind {
                name: table.to_string(),
                expected: TableKind::Ordinary,
                actual: entry.table_kind(),
            })
    }

    fn insert_table(&mut self, name: &str, descriptor: TableDescriptor) {
        let descriptor = Arc::new(descriptor);
        self.relationships.add_descriptor(name, &descriptor);
        let kind = if is_meta_table_name(name) {
            EntryKind::MetaTable {
                descriptor,
                data_tables: BTreeSet::new(),
            }
        } else {
            EntryKind::Ordinary(descriptor)
        };
        self.entries.insert(
            name.to_string(),
            CatalogEntry {
                name: name.to_string(),
                kind,
            },
        );
        self.relink();
    }

    /// Re-reads one table's stored definition and swaps in the new descriptor.
    fn refresh_table<E: Engine>(&mut self, engine: &mut E, table: &str) -> Result<()> {
        let relation = engine
            .list_relations(&[RelationKind::Table])?
            .into_iter()
            .find(|r| r.name == table)
            .ok_or_else(|| SewError::TableNotFound(table.to_string()))?;
        let descriptor =
            parse_table_sql(&relation.definition).map_err(|e| SewError::parse(table, e))?;
        if is_meta_table_name(table) {
            first_error(validate_meta_table(table, &descriptor))?;
        }
        let descriptor = Arc::new(descriptor);

        if let Some(entry) = self.entries.get_mut(table) {
            match &mut entry.kind {
                EntryKind::Ordinary(current)
                | EntryKind::MetaTable {
                    descriptor: current,
                    ..
                }
                | EntryKind::DataTable {
                    descriptor: current,
                    ..
                } => *current = Arc::clone(&descriptor),
                EntryKind::View => {}
            }
        }
        self.relationships.remove_child_table(table);
        self.relationships.add_descriptor(table, &descriptor);
        debug!(table, columns = descriptor.columns().len(), "Refreshed table definition");
        Ok(())
    }

    /// Recomputes data-table links from the governance map.
    fn relink(&mut self) {
        for entry in self.entries.values_mut() {
            if let EntryKind::DataTable { descriptor, .. } = &entry.kind {
                let descriptor = Arc::clone(descriptor);
                entry.kind = EntryKind::Ordinary(descriptor);
            } else if let EntryKind::MetaTable { data_tables, .. } = &mut entry.kind {
                data_tables.clear();
            }
        }

        let links: Vec<(String, String)> = self
            .governance
            .iter()
            .filter_map(|(data_table, metas)| {
                let meta = metas.iter().find(|m| {
                    self.entries.get(m.as_str()).map(CatalogEntry::table_kind)
                        == Some(TableKind::MetaTable)
                })?;
                let is_ordinary = self.entries.get(data_table).map(CatalogEntry::table_kind)
                    == Some(TableKind::Ordinary);
                is_ordinary.then(|| (data_table.clone(), meta.clone()))
            })
            .collect();

        for (data_table, meta) in links {
            if let Some(entry) = self.entries.get_mut(&data_table) {
                if let EntryKind::Ordinary(descriptor) = &entry.kind {
                    let descriptor = Arc::clone(descriptor);
                    entry.kind = EntryKind::DataTable {
                        descriptor,
                        metadata_table: meta.clone(),
                    };
                }
            }
            if let Some(EntryKind::MetaTable { data_tables, .. }) =
                self.entries.get_mut(&meta).map(|e| &mut e.kind)
            {
                data_tables.insert(data_table);
            }
        }
    }

    fn rebuild_relationships(&mut self) {
        self.relationships.clear();
        for entry in self.entries.values() {
            if let Some(descriptor) = entry.descriptor() {
                self.relationships.add_descriptor(&entry.name, descriptor);
            }
        }
    }
}

fn first_error(errors: Vec<ValidationError>) -> Result<()> {
    match errors.into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Reads the `data_tblname` column of a metadata table.
fn read_governed_names<E: Engine>(engine: &mut E, meta_table: &str) -> Result<Vec<String>> {
    engine.execute(
        &format!(
            "select {} from {}",
            DATA_TABLE_COLUMN,
            enclose_table_name(meta_table)
        ),
        &[],
    )?;

    let mut names = Vec::new();
    for row in engine.fetch_all()? {
        match row.get(0) {
            Some(Value::Text(name)) => names.push(name.clone()),
            other => {
                warn!(table = meta_table, value = ?other, "Skipping non-text data table name");
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Relation, Row};

    /// Engine double that records statements and serves canned relations.
    #[derive(Default)]
    struct RecordingEngine {
        relations: Vec<Relation>,
        statements: Vec<String>,
        fail_on: Option<String>,
        savepoints: Vec<String>,
    }

    impl RecordingEngine {
        fn with_tables(tables: &[(&str, &str)]) -> Self {
            Self {
                relations: tables
                    .iter()
                    .map(|(name, definition)| Relation {
                        name: name.to_string(),
                        definition: definition.to_string(),
                        kind: if definition.starts_with("CREATE VIEW") {
                            RelationKind::View
                        } else {
                            RelationKind::Table
                        },
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl Engine for RecordingEngine {
        fn list_relations(&mut self, kinds: &[RelationKind]) -> Result<Vec<Relation>> {
            Ok(self
                .relations
                .iter()
                .filter(|r| kinds.contains(&r.kind))
                .cloned()
                .collect())
        }

        fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<usize> {
            if self.fail_on.as_deref().is_some_and(|f| sql.starts_with(f)) {
                return Err(SewError::EngineError(rusqlite::Error::QueryReturnedNoRows));
            }
            self.statements.push(sql.to_string());
            Ok(0)
        }

        fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize> {
            self.statements.push(sql.to_string());
            Ok(rows.len())
        }

        fn fetch_one(&mut self) -> Result<Option<Row>> {
            Ok(None)
        }

        fn fetch_all(&mut self) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn commit(&mut self) -> Result<()> {
            self.statements.push("COMMIT".into());
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.statements.push("ROLLBACK".into());
            Ok(())
        }

        fn savepoint(&mut self, name: &str) -> Result<()> {
            self.savepoints.push(format!("SAVEPOINT {name}"));
            Ok(())
        }

        fn release(&mut self, name: &str) -> Result<()> {
            self.savepoints.push(format!("RELEASE {name}"));
            Ok(())
        }

        fn rollback_to(&mut self, name: &str) -> Result<()> {
            self.savepoints.push(format!("ROLLBACK TO {name}"));
            Ok(())
        }
    }

    fn meta_desc() -> TableDescriptor {
        TableDescriptor::builder()
            .column(DATA_TABLE_COLUMN, "TEXT")
            .column("run", "INTEGER")
            .build()
            .unwrap()
    }

    fn plain_desc() -> TableDescriptor {
        TableDescriptor::builder().column("x", "REAL").build().unwrap()
    }

    #[test]
    fn test_reload_classifies_and_indexes() {
        let mut engine = RecordingEngine::with_tables(&[
            ("parent", "CREATE TABLE parent(id INTEGER, val TEXT)"),
            (
                "child",
                "CREATE TABLE child(col1, col2, FOREIGN KEY(col2) REFERENCES parent(id))",
            ),
            ("child_view", "CREATE VIEW child_view as select * from child"),
        ]);
        let mut catalog = TableCatalog::default();
        let names = catalog.reload(&mut engine).unwrap();

        assert_eq!(names, vec!["parent", "child", "child_view"]);
        assert_eq!(catalog.get("parent").unwrap().table_kind(), TableKind::Ordinary);
        assert_eq!(catalog.get("child_view").unwrap().table_kind(), TableKind::View);
        assert!(catalog.get("child_view").unwrap().descriptor().is_none());
        let children = catalog.relationships().children_of("parent", "id").unwrap();
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_reload_keeps_previous_catalog_on_error() {
        let mut engine = RecordingEngine::with_tables(&[("t", "CREATE TABLE t(a INTEGER)")]);
        let mut catalog = TableCatalog::default();
        catalog.reload(&mut engine).unwrap();
        let before = catalog.clone();

        engine.relations.push(Relation {
            name: "broken".into(),
            definition: "CREATE TABLE broken(a INTEGER, FOREIGN KEY(a))".into(),
            kind: RelationKind::Table,
        });
        let err = catalog.reload(&mut engine).unwrap_err();
        assert!(matches!(err, SewError::ParseError { ref table, .. } if table == "broken"));
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_reload_rejects_meta_table_without_required_column() {
        let mut engine =
            RecordingEngine::with_tables(&[("x_metadata", "CREATE TABLE x_metadata(a INTEGER)")]);
        let err = TableCatalog::default().reload(&mut engine).unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::MissingDataTableColumn(_))
        ));
    }

    #[test]
    fn test_create_table_records_entry_and_edges() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        let desc = TableDescriptor::builder()
            .column("pid", "INTEGER")
            .foreign_key("pid", "parent", "id")
            .build()
            .unwrap();

        let sql = catalog
            .create_table(&mut engine, desc, "kid", CreateOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "create table \"kid\"(pid INTEGER, FOREIGN KEY(pid) REFERENCES parent(id))"
        );
        assert_eq!(engine.statements, vec![sql]);
        assert!(catalog.relationships().children_of("parent", "id").is_some());
        assert_eq!(catalog.get("kid").unwrap().table_kind(), TableKind::Ordinary);
    }

    #[test]
    fn test_create_table_commit_now() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_table(
                &mut engine,
                plain_desc(),
                "t",
                CreateOptions {
                    commit_now: true,
                    ..CreateOptions::default()
                },
            )
            .unwrap();
        assert_eq!(engine.statements.last().map(String::as_str), Some("COMMIT"));
    }

    #[test]
    fn test_meta_table_validation_runs_before_engine() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();

        let err = catalog
            .create_meta_table(&mut engine, meta_desc(), "runs", CreateOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::MissingMetaSuffix(_))
        ));

        let err = catalog
            .create_meta_table(&mut engine, plain_desc(), "runs_metadata", CreateOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::MissingDataTableColumn(_))
        ));
        assert!(engine.statements.is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_data_table_validation_runs_before_engine() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();

        let err = catalog
            .create_data_table(
                &mut engine,
                plain_desc(),
                "run1",
                &[Value::Integer(1)],
                "missing_metadata",
                DataTableOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::UnknownMetaTable(_))
        ));

        catalog
            .create_meta_table(&mut engine, meta_desc(), "runs_metadata", CreateOptions::default())
            .unwrap();
        engine.statements.clear();

        let err = catalog
            .create_data_table(
                &mut engine,
                plain_desc(),
                "run1",
                &[],
                "runs_metadata",
                DataTableOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::MetadataArity {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert!(engine.statements.is_empty());
        assert!(engine.savepoints.is_empty());
    }

    #[test]
    fn test_create_data_table_links_both_ways() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_meta_table(&mut engine, meta_desc(), "runs_metadata", CreateOptions::default())
            .unwrap();

        catalog
            .create_data_table(
                &mut engine,
                plain_desc(),
                "run1",
                &[Value::Integer(1)],
                "runs_metadata",
                DataTableOptions::default(),
            )
            .unwrap();

        assert_eq!(
            engine.statements[1],
            "insert into \"runs_metadata\"(data_tblname,run) values(?,?)"
        );
        assert_eq!(
            engine.savepoints,
            vec![
                format!("SAVEPOINT {DATA_TABLE_SAVEPOINT}"),
                format!("RELEASE {DATA_TABLE_SAVEPOINT}")
            ]
        );
        match &catalog.get("run1").unwrap().kind {
            EntryKind::DataTable { metadata_table, .. } => assert_eq!(metadata_table, "runs_metadata"),
            other => panic!("expected data table, got {other:?}"),
        }
        match &catalog.get("runs_metadata").unwrap().kind {
            EntryKind::MetaTable { data_tables, .. } => assert!(data_tables.contains("run1")),
            other => panic!("expected metadata table, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_data_table_rolls_back_savepoint() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_meta_table(&mut engine, meta_desc(), "runs_metadata", CreateOptions::default())
            .unwrap();
        engine.fail_on = Some("create table \"run1\"".into());

        let err = catalog
            .create_data_table(
                &mut engine,
                plain_desc(),
                "run1",
                &[Value::Integer(1)],
                "runs_metadata",
                DataTableOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, SewError::EngineError(_)));
        assert_eq!(
            engine.savepoints.last(),
            Some(&format!("ROLLBACK TO {DATA_TABLE_SAVEPOINT}"))
        );
        assert!(!catalog.contains("run1"));
    }

    #[test]
    fn test_drop_meta_table_downgrades_data_tables() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_meta_table(&mut engine, meta_desc(), "runs_metadata", CreateOptions::default())
            .unwrap();
        catalog
            .create_data_table(
                &mut engine,
                plain_desc(),
                "run1",
                &[Value::Integer(1)],
                "runs_metadata",
                DataTableOptions::default(),
            )
            .unwrap();

        let sql = catalog.drop_table(&mut engine, "runs_metadata", false).unwrap();
        assert_eq!(sql, "drop table \"runs_metadata\"");
        assert_eq!(catalog.get("run1").unwrap().table_kind(), TableKind::Ordinary);
    }

    #[test]
    fn test_drop_view_uses_drop_view() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_table(&mut engine, plain_desc(), "t", CreateOptions::default())
            .unwrap();
        catalog
            .create_view(&mut engine, "t", &SelectQuery::all(), None, CreateOptions::default())
            .unwrap();
        assert_eq!(catalog.get("t_view").unwrap().table_kind(), TableKind::View);

        let sql = catalog.drop_table(&mut engine, "t_view", false).unwrap();
        assert_eq!(sql, "drop view \"t_view\"");
        assert!(!catalog.contains("t_view"));
    }

    #[test]
    fn test_unknown_table_errors() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        assert!(matches!(
            catalog.drop_table(&mut engine, "nope", false),
            Err(SewError::TableNotFound(_))
        ));
        assert!(matches!(
            catalog.drop_column(&mut engine, "nope", "a", false),
            Err(SewError::TableNotFound(_))
        ));
        assert!(engine.statements.is_empty());
    }

    #[test]
    fn test_add_column_rejects_duplicate() {
        let mut engine = RecordingEngine::default();
        let mut catalog = TableCatalog::default();
        catalog
            .create_table(&mut engine, plain_desc(), "t", CreateOptions::default())
            .unwrap();
        engine.statements.clear();

        let err = catalog
            .add_column(&mut engine, "t", ColumnDescriptor::new("x", "INTEGER"), false)
            .unwrap_err();
        assert!(matches!(
            err,
            SewError::ValidationError(ValidationError::DuplicateColumn(_))
        ));
        assert!(engine.statements.is_empty());
    }

    #[test]
    fn test_table_kind_display() {
        assert_eq!(TableKind::MetaTable.to_string(), "metadata table");
        assert_eq!(TableKind::Ordinary.to_string(), "table");
    }
}

//! SQLite catalog and table handles built on `sew-core`.
//!
//! Opening a [`Database`] reads every table and view definition back from
//! `sqlite_master`, parses it into a [`TableDescriptor`](sew_core::TableDescriptor)
//! and classifies it. Tables then become reachable through typed handles that
//! generate the SQL for common operations.
//!
//! # Architecture
//!
//! - **`engine`**: the [`Engine`] trait and its `rusqlite` implementation
//! - **`catalog`**: [`TableCatalog`], classification and schema mutations
//! - **`relations`**: [`RelationshipIndex`] of foreign-key edges
//! - **`table`**: [`Table`], [`View`], [`MetaTable`] and [`DataTable`] handles
//! - **`database`**: [`Database`], tying an engine to its catalog
//! - **`config`**: YAML-loadable [`DatabaseConfig`]
//!
//! # Metadata tables
//!
//! A table whose name ends in `_metadata` and has a `data_tblname` column is
//! a metadata table. Each of its rows describes one data table, named by
//! `data_tblname`. [`Database::create_data_table`] creates a data table and
//! its metadata row together.
//!
//! ```
//! use sew_core::TableDescriptor;
//! use sew_sqlite::{CreateOptions, Database, DataTableOptions, TableKind, Value};
//!
//! let mut db = Database::open_in_memory().unwrap();
//! let meta = TableDescriptor::builder()
//!     .column("data_tblname", "TEXT")
//!     .column("units", "TEXT")
//!     .build()
//!     .unwrap();
//! db.create_meta_table(meta, "readings_metadata", CreateOptions::default()).unwrap();
//!
//! let data = TableDescriptor::builder().column("t", "REAL").build().unwrap();
//! db.create_data_table(
//!     data,
//!     "run1",
//!     &[Value::Text("kelvin".into())],
//!     "readings_metadata",
//!     DataTableOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(db.kind_of("run1"), Some(TableKind::DataTable));
//! let metadata = db.data_table("run1").unwrap().metadata().unwrap();
//! assert_eq!(metadata.value("units").unwrap(), &Value::Text("kelvin".into()));
//! ```

mod catalog;
mod config;
mod database;
mod engine;
mod error;
mod relations;
mod table;

pub use catalog::{
    CatalogEntry, CreateOptions, DataTableOptions, EntryKind, TableCatalog, TableKind,
};
pub use config::DatabaseConfig;
pub use database::Database;
pub use engine::{Engine, Relation, RelationKind, Row, SqliteEngine};
pub use error::{Result, SewError};
pub use relations::{ColumnRef, RelationshipIndex};
pub use rusqlite::types::Value;
pub use table::{DataTable, InsertOptions, MetaTable, Table, TableHandle, View};

//! Error types for catalog and table-handle operations.
//!
//! Provides a unified error type covering engine failures, definition
//! parsing, validation, handle lookups and configuration loading.

use sew_core::{ParseError, ValidationError};
use thiserror::Error;

use crate::catalog::TableKind;

/// Errors that can occur while working with a database.
#[derive(Debug, Error)]
pub enum SewError {
    /// SQLite operation failure, propagated unchanged.
    #[error("engine error: {0}")]
    EngineError(#[from] rusqlite::Error),

    /// A stored table definition could not be parsed.
    #[error("failed to parse definition of table {table}: {source}")]
    ParseError {
        /// Table whose definition failed.
        table: String,
        /// Underlying parser error.
        #[source]
        source: ParseError,
    },

    /// A descriptor or naming convention was violated.
    #[error("validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// No table or view with this name is known to the catalog.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The entry exists but is not of the requested kind.
    #[error("table {name} is a {actual}, not a {expected}")]
    WrongTableKind {
        /// Entry name.
        name: String,
        /// Requested kind.
        expected: TableKind,
        /// Kind recorded in the catalog.
        actual: TableKind,
    },

    /// The table has no foreign key on the named column.
    #[error("table {table} has no foreign key on column {column}")]
    ForeignKeyNotFound {
        /// Child table.
        table: String,
        /// Requested child column.
        column: String,
    },

    /// Parent-row retrieval on a table without foreign keys.
    #[error("table {0} has no foreign keys")]
    NoForeignKeys(String),

    /// No metadata row names the data table.
    #[error("no metadata found for {data_table} in {meta_table}")]
    MetadataNotFound {
        /// Metadata table searched.
        meta_table: String,
        /// Data table requested.
        data_table: String,
    },

    /// A fetched row has no column with this name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl SewError {
    pub(crate) fn parse(table: impl Into<String>, source: ParseError) -> Self {
        Self::ParseError {
            table: table.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`SewError`].
pub type Result<T> = std::result::Result<T, SewError>;

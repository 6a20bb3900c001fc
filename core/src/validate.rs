//! Descriptor and naming-convention validation.
//!
//! Catches structural problems in table descriptors (empty or duplicate
//! column names, constraints naming unknown columns) and violations of the
//! metadata-table convention before any statement reaches the engine.
//!
//! # Examples
//!
//! ```
//! use sew_core::*;
//!
//! let desc = TableDescriptor::builder()
//!     .column("data_tblname", "TEXT")
//!     .column("run", "INTEGER")
//!     .build()
//!     .unwrap();
//! assert!(validate_meta_table("runs_metadata", &desc).is_empty());
//!
//! // Missing the reserved suffix
//! let errors = validate_meta_table("runs", &desc);
//! assert!(matches!(errors[0], ValidationError::MissingMetaSuffix(_)));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::parser::split_top_level;
use crate::types::{DATA_TABLE_COLUMN, META_TABLE_SUFFIX, TableDescriptor};

/// Validation errors.
///
/// Each variant names one contract violation. They are raised before any
/// engine statement runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A column name is empty or whitespace-only.
    #[error("column name cannot be empty")]
    EmptyColumnName,
    /// Two columns share a name.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// A column's type clause would not stay inside its own definition
    /// (a top-level comma, unbalanced parentheses or an open quote).
    #[error("type clause '{raw_type}' of column {column} is not a single column definition")]
    MalformedColumnType {
        /// Column name.
        column: String,
        /// The offending type clause.
        raw_type: String,
    },
    /// A `UNIQUE` group lists no columns.
    #[error("unique constraint must name at least one column")]
    EmptyUniqueConstraint,
    /// A `UNIQUE` group names a column the table does not have.
    #[error("unique constraint names unknown column: {0}")]
    UnknownUniqueColumn(String),
    /// A foreign key's child column does not exist in the table.
    #[error("foreign key names unknown child column: {0}")]
    UnknownForeignKeyColumn(String),
    /// A foreign key has an empty parent table or column.
    #[error("foreign key on {0} has an empty parent table or column")]
    EmptyForeignKeyTarget(String),
    /// A metadata table name lacks the reserved suffix.
    #[error("metadata table {0} must end with '_metadata'")]
    MissingMetaSuffix(String),
    /// A metadata table lacks the required `data_tblname` column.
    #[error("metadata table {0} must contain the column 'data_tblname'")]
    MissingDataTableColumn(String),
    /// A data table refers to a metadata table the catalog does not know.
    #[error("metadata table {0} does not exist")]
    UnknownMetaTable(String),
    /// Metadata values do not fill the metadata table's row.
    #[error("metadata table {table} expects {expected} values, got {actual}")]
    MetadataArity {
        /// Metadata table name.
        table: String,
        /// Column count of the metadata table.
        expected: usize,
        /// Values supplied, including the data table name.
        actual: usize,
    },
    /// A strict typed column was requested for an unrecognized SQL type.
    #[error("unknown SQL type '{raw_type}' for column {column}")]
    UnknownColumnType {
        /// Column name.
        column: String,
        /// The unrecognized type clause.
        raw_type: String,
    },
    /// Columns from different tables were grouped together.
    #[error("column set mixes tables {expected} and {found}")]
    MixedColumnTables {
        /// Table of the first column.
        expected: String,
        /// Offending table.
        found: String,
    },
}

/// Validates a table descriptor.
///
/// Checks for empty and duplicate column names, malformed type clauses, empty
/// unique groups, unique groups and foreign keys that name unknown columns,
/// and empty foreign-key targets. Returns every problem found, in that order.
pub fn validate_descriptor(descriptor: &TableDescriptor) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen: HashSet<&str> = HashSet::new();
    for column in &descriptor.columns {
        if column.name.trim().is_empty() {
            errors.push(ValidationError::EmptyColumnName);
            continue;
        }
        if !seen.insert(column.name.as_str()) {
            errors.push(ValidationError::DuplicateColumn(column.name.clone()));
        }
        let single = split_top_level(&column.raw_type).is_ok_and(|parts| parts.len() == 1);
        if !single {
            errors.push(ValidationError::MalformedColumnType {
                column: column.name.clone(),
                raw_type: column.raw_type.clone(),
            });
        }
    }

    for unique in &descriptor.uniques {
        if unique.columns.is_empty() {
            errors.push(ValidationError::EmptyUniqueConstraint);
        }
        for name in &unique.columns {
            if !seen.contains(name.as_str()) {
                errors.push(ValidationError::UnknownUniqueColumn(name.clone()));
            }
        }
    }

    for fk in &descriptor.foreign_keys {
        if !seen.contains(fk.child_column.as_str()) {
            errors.push(ValidationError::UnknownForeignKeyColumn(
                fk.child_column.clone(),
            ));
        }
        if fk.parent_table.trim().is_empty() || fk.parent_column.trim().is_empty() {
            errors.push(ValidationError::EmptyForeignKeyTarget(fk.child_column.clone()));
        }
    }

    errors
}

/// Validates the metadata-table convention for `name` and `descriptor`.
///
/// The name must end with [`META_TABLE_SUFFIX`] and the descriptor must
/// contain [`DATA_TABLE_COLUMN`]. Descriptor structure is not re-checked.
pub fn validate_meta_table(name: &str, descriptor: &TableDescriptor) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !is_meta_table_name(name) {
        errors.push(ValidationError::MissingMetaSuffix(name.to_string()));
    }
    if !descriptor.contains_column(DATA_TABLE_COLUMN) {
        errors.push(ValidationError::MissingDataTableColumn(name.to_string()));
    }
    errors
}

/// Returns `true` if `name` carries the reserved metadata suffix.
pub fn is_meta_table_name(name: &str) -> bool {
    name.ends_with(META_TABLE_SUFFIX)
}

//! Core table-description types and SQL text handling for sew.
//!
//! This crate has no engine dependency. It covers the text side of the
//! SQLite convenience layer:
//!
//! - [`TableDescriptor`]: columns, `UNIQUE` groups, foreign keys and extra
//!   table constraints, built through [`TableDescriptor::builder`].
//! - [`ValueKind`]: semantic kind resolved from a declared SQL type.
//! - [`parse_table_sql`]: reads a stored `CREATE TABLE` definition back
//!   into a descriptor.
//! - [`statement`]: generates every statement the handles execute.
//! - [`Condition`]: immutable `WHERE` fragments with AND/OR bracketing.
//! - [`Column`] / [`ColumnSet`]: per-table column handles.
//!
//! Validation ([`validate_descriptor`], [`validate_meta_table`]) catches
//! structural errors and metadata-convention violations before anything is
//! sent to the engine.
//!
//! # Example
//!
//! ```
//! use sew_core::*;
//! use sew_core::statement::{StatementOptions, create_table_sql};
//!
//! let desc = TableDescriptor::builder()
//!     .column("col1", "INTEGER")
//!     .column("col2", "")
//!     .column("col3", "real")
//!     .unique(["col1", "col2"])
//!     .foreign_key("col1", "parent", "id")
//!     .build()
//!     .unwrap();
//!
//! let sql = create_table_sql(&desc, "child", false, &StatementOptions::default());
//! assert_eq!(parse_table_sql(&sql).unwrap(), desc);
//! ```

mod column;
mod condition;
mod parser;
mod types;
mod validate;

pub mod statement;

pub use column::{Column, ColumnSet};
pub use condition::{Condition, where_clause};
pub use parser::{ParseError, parse_column_desc, parse_table_sql, split_columns_sql};
pub use types::*;
pub use validate::{ValidationError, is_meta_table_name, validate_descriptor, validate_meta_table};

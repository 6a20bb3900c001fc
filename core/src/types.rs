//! Table descriptor types.
//!
//! This module defines the structured form of a table definition: its
//! columns, `UNIQUE` groups, foreign keys and any other table-level
//! constraints. Descriptors are produced either by the DDL parser
//! ([`parse_table_sql`](crate::parse_table_sql)) or programmatically through
//! [`TableDescriptor::builder`], and serialize back into DDL with
//! [`create_table_sql`](crate::statement::create_table_sql).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::statement::quote_identifier;
use crate::validate::{ValidationError, validate_descriptor};

/// Reserved suffix marking a table as a metadata table.
pub const META_TABLE_SUFFIX: &str = "_metadata";

/// Column every metadata table must carry, naming the data table a row describes.
pub const DATA_TABLE_COLUMN: &str = "data_tblname";

/// Semantic value kind of a column, derived from its declared SQL type.
///
/// # Examples
///
/// ```
/// use sew_core::ValueKind;
///
/// assert_eq!(ValueKind::classify("INTEGER PRIMARY KEY"), ValueKind::Integer);
/// assert_eq!(ValueKind::classify("varchar(20)"), ValueKind::Text);
/// assert_eq!(ValueKind::classify(""), ValueKind::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ValueKind {
    /// Any type containing `INT`.
    Integer,
    /// `REAL`, `DOUBLE` or `FLOAT`.
    Real,
    /// `TEXT` or any `CHAR` variant.
    Text,
    /// `BLOB`.
    Blob,
    /// `NUMERIC`.
    Numeric,
    /// No keyword matched (including an empty type).
    #[default]
    Unknown,
}

/// Keyword table in match order; first hit wins.
const KIND_KEYWORDS: &[(&str, ValueKind)] = &[
    ("INT", ValueKind::Integer),
    ("TEXT", ValueKind::Text),
    ("CHAR", ValueKind::Text),
    ("REAL", ValueKind::Real),
    ("DOUBLE", ValueKind::Real),
    ("FLOAT", ValueKind::Real),
    ("BLOB", ValueKind::Blob),
    ("NUMERIC", ValueKind::Numeric),
];

impl ValueKind {
    /// Classifies a raw SQL type by case-insensitive keyword match.
    pub fn classify(raw_type: &str) -> Self {
        let upper = raw_type.to_ascii_uppercase();
        KIND_KEYWORDS
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(ValueKind::Unknown)
    }

    /// Canonical SQL type name used when declaring a column of this kind.
    ///
    /// Returns an empty string for [`ValueKind::Unknown`], which declares an
    /// untyped column.
    pub fn sql_type(self) -> &'static str {
        match self {
            ValueKind::Integer => "INTEGER",
            ValueKind::Real => "REAL",
            ValueKind::Text => "TEXT",
            ValueKind::Blob => "BLOB",
            ValueKind::Numeric => "NUMERIC",
            ValueKind::Unknown => "",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Text => "text",
            ValueKind::Blob => "blob",
            ValueKind::Numeric => "numeric",
            ValueKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Everything after the name in the definition, trimmed
    /// (e.g. `INTEGER PRIMARY KEY`). Empty for untyped columns.
    pub raw_type: String,
    /// Kind derived from `raw_type`.
    pub value_kind: ValueKind,
}

impl ColumnDescriptor {
    /// Creates a column, deriving its value kind from the raw type.
    ///
    /// Surrounding whitespace is dropped from `raw_type` so the column reads
    /// back identically from the DDL it renders.
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into().trim().to_string();
        Self {
            name: name.into(),
            value_kind: ValueKind::classify(&raw_type),
            raw_type,
        }
    }

    /// Renders the column as it appears inside `CREATE TABLE`.
    ///
    /// The name is quoted when it is not a plain identifier.
    pub fn to_sql(&self) -> String {
        let name = quote_identifier(&self.name);
        if self.raw_type.is_empty() {
            name.into_owned()
        } else {
            format!("{name} {}", self.raw_type)
        }
    }
}

/// Writes `CONSTRAINT <name> ` when a constraint is named.
fn write_constraint_name(f: &mut fmt::Formatter<'_>, name: Option<&str>) -> fmt::Result {
    match name {
        Some(name) => write!(f, "CONSTRAINT {} ", quote_identifier(name)),
        None => Ok(()),
    }
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A `UNIQUE(...)` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Name given with `CONSTRAINT <name>`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Participating columns, in declaration order.
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    /// Creates a unique group over the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Names the constraint.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_constraint_name(f, self.name.as_deref())?;
        write!(f, "UNIQUE({})", quoted_list(&self.columns))
    }
}

/// Referential action attached to a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    /// `CASCADE`
    Cascade,
    /// `SET NULL`
    SetNull,
    /// `SET DEFAULT`
    SetDefault,
    /// `RESTRICT`
    Restrict,
    /// `NO ACTION`
    NoAction,
}

impl ForeignKeyAction {
    /// Parses an action keyword, tolerating case and repeated whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect::<Vec<_>>()
            .join(" ");
        match normalized.as_str() {
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            "RESTRICT" => Some(Self::Restrict),
            "NO ACTION" => Some(Self::NoAction),
            _ => None,
        }
    }

    /// SQL keyword form.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Name given with `CONSTRAINT <name>`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referencing column in the owning table.
    pub child_column: String,
    /// Referenced table.
    pub parent_table: String,
    /// Referenced column.
    pub parent_column: String,
    /// `ON DELETE` action, if declared.
    pub on_delete: Option<ForeignKeyAction>,
    /// `ON UPDATE` action, if declared.
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKeyDescriptor {
    /// Creates a foreign key without referential actions.
    pub fn new(
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            child_column: child_column.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Names the constraint.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the `ON DELETE` action.
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the `ON UPDATE` action.
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// The referenced `table(column)` pair, quoted where needed.
    pub fn references(&self) -> String {
        format!(
            "{}({})",
            quote_identifier(&self.parent_table),
            quote_identifier(&self.parent_column)
        )
    }
}

impl fmt::Display for ForeignKeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_constraint_name(f, self.name.as_deref())?;
        write!(
            f,
            "FOREIGN KEY({}) REFERENCES {}",
            quote_identifier(&self.child_column),
            self.references()
        )?;
        if let Some(action) = self.on_delete {
            write!(f, " ON DELETE {}", action.as_sql())?;
        }
        if let Some(action) = self.on_update {
            write!(f, " ON UPDATE {}", action.as_sql())?;
        }
        Ok(())
    }
}

/// Structured form of one table's definition.
///
/// Fields are read-only from outside the crate: descriptors are built
/// through [`TableDescriptor::builder`] (validated) or parsed from DDL
/// (taken as the engine stored them).
///
/// # Examples
///
/// ```
/// use sew_core::{TableDescriptor, ValueKind};
///
/// let desc = TableDescriptor::builder()
///     .typed_column("id", ValueKind::Integer)
///     .column("name", "TEXT NOT NULL")
///     .unique(["name"])
///     .build()
///     .unwrap();
///
/// assert_eq!(desc.column_names(), vec!["id", "name"]);
/// assert!(desc.contains_column("name"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) uniques: Vec<UniqueConstraint>,
    pub(crate) foreign_keys: Vec<ForeignKeyDescriptor>,
    pub(crate) constraints: Vec<String>,
}

impl TableDescriptor {
    /// Starts a new, empty builder.
    pub fn builder() -> TableDescriptorBuilder {
        TableDescriptorBuilder::default()
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// `UNIQUE` groups in declaration order.
    pub fn uniques(&self) -> &[UniqueConstraint] {
        &self.uniques
    }

    /// Foreign keys in declaration order.
    pub fn foreign_keys(&self) -> &[ForeignKeyDescriptor] {
        &self.foreign_keys
    }

    /// Other table-level constraints (`PRIMARY KEY(...)`, `CHECK(...)`, ...),
    /// verbatim.
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns `true` if a column with this name exists.
    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Looks up the foreign key declared on `child_column`.
    pub fn foreign_key(&self, child_column: &str) -> Option<&ForeignKeyDescriptor> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.child_column == child_column)
    }

    /// Returns a builder pre-filled with this descriptor's contents.
    ///
    /// Used to derive a replacement descriptor; the original is untouched.
    pub fn to_builder(&self) -> TableDescriptorBuilder {
        TableDescriptorBuilder {
            columns: self.columns.clone(),
            uniques: self.uniques.clone(),
            foreign_keys: self.foreign_keys.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

/// Builder for [`TableDescriptor`].
///
/// Each builder starts empty; nothing is shared between instances.
/// [`build`](Self::build) runs [`validate_descriptor`] and reports the first
/// problem found.
#[derive(Debug, Clone, Default)]
pub struct TableDescriptorBuilder {
    columns: Vec<ColumnDescriptor>,
    uniques: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKeyDescriptor>,
    constraints: Vec<String>,
}

impl TableDescriptorBuilder {
    /// Adds a column with a raw type clause (may be empty).
    pub fn column(mut self, name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        self.columns.push(ColumnDescriptor::new(name, raw_type));
        self
    }

    /// Adds a column declared with the canonical type of `kind`.
    pub fn typed_column(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.column(name, kind.sql_type())
    }

    /// Adds a `UNIQUE` group.
    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniques.push(UniqueConstraint::new(columns));
        self
    }

    /// Adds a foreign key `child_column -> parent_table(parent_column)`.
    pub fn foreign_key(
        self,
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        self.with_foreign_key(ForeignKeyDescriptor::new(
            child_column,
            parent_table,
            parent_column,
        ))
    }

    /// Adds a fully specified unique group.
    pub fn with_unique(mut self, unique: UniqueConstraint) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a fully specified foreign key.
    pub fn with_foreign_key(mut self, fk: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a verbatim table constraint such as `PRIMARY KEY(a, b)`.
    pub fn constraint(mut self, text: impl Into<String>) -> Self {
        self.constraints.push(text.into());
        self
    }

    /// Removes a column by name, along with nothing else.
    ///
    /// Unique groups or foreign keys that still mention the column make
    /// [`build`](Self::build) fail.
    pub fn without_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c.name != name);
        self
    }

    /// Validates and produces the descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: empty or duplicate column
    /// names, raw types that would not survive inside `CREATE TABLE`, unique
    /// groups or foreign keys naming unknown columns, or empty foreign-key
    /// targets.
    pub fn build(self) -> Result<TableDescriptor, ValidationError> {
        let descriptor = TableDescriptor {
            columns: self.columns,
            uniques: self.uniques,
            foreign_keys: self.foreign_keys,
            constraints: self.constraints,
        };
        match validate_descriptor(&descriptor).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(descriptor),
        }
    }
}

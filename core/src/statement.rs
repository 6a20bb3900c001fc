//! SQL statement generation.
//!
//! Every statement the handles execute is produced here. `CREATE TABLE`
//! output is exactly the grammar [`parse_table_sql`](crate::parse_table_sql)
//! reads back, so a descriptor survives the trip through the engine.
//!
//! # Example
//!
//! ```
//! use sew_core::statement::{SelectQuery, StatementOptions, select_sql};
//! use sew_core::Condition;
//!
//! let query = SelectQuery::columns(["col1", "col2"])
//!     .filter(Condition::new("col1").gt("?"))
//!     .filter(Condition::new("col2").gt("?"))
//!     .order_by("col1 desc");
//!
//! assert_eq!(
//!     select_sql("tablename", &query, &StatementOptions { enclose_table_names: false }),
//!     "select col1,col2 from tablename where col1 > ? and col2 > ? order by col1 desc"
//! );
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, where_clause};
use crate::types::{ColumnDescriptor, TableDescriptor};

/// Rendering options shared by all generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementOptions {
    /// Always wrap table and view names in double quotes. Names that are
    /// not plain identifiers are quoted either way.
    pub enclose_table_names: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            enclose_table_names: true,
        }
    }
}

impl StatementOptions {
    /// Renders `name` according to these options.
    ///
    /// With enclosure off, names that are not plain identifiers are still
    /// quoted (see [`quote_identifier`]).
    pub fn table_name(&self, name: &str) -> String {
        if self.enclose_table_names {
            enclose_table_name(name)
        } else {
            quote_identifier(name).into_owned()
        }
    }
}

/// Words that cannot appear bare as a column or table name in generated DDL.
///
/// The first five start table constraints and would be misread by the
/// parser; the rest are reserved by SQLite.
const RESERVED_WORDS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "CHECK", "UNIQUE", "FOREIGN", "AND", "AS", "BY", "DEFAULT",
    "FROM", "GROUP", "INDEX", "KEY", "NOT", "NULL", "OR", "ORDER", "REFERENCES", "SELECT",
    "TABLE", "WHERE",
];

/// Double-quotes an identifier, doubling embedded quotes.
pub fn enclose_table_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Returns `name` unchanged if it is a plain identifier
/// (`[A-Za-z_][A-Za-z0-9_]*` and not a reserved word), otherwise enclosed
/// with [`enclose_table_name`].
///
/// # Examples
///
/// ```
/// use sew_core::statement::quote_identifier;
///
/// assert_eq!(quote_identifier("col1"), "col1");
/// assert_eq!(quote_identifier("my col"), "\"my col\"");
/// assert_eq!(quote_identifier("unique"), "\"unique\"");
/// ```
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    if is_plain_identifier(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(enclose_table_name(name))
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.iter().any(|w| name.eq_ignore_ascii_case(w))
}

/// `?,?,?` with `n` placeholders.
pub fn question_marks(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// `a is not null and b is not null`
pub fn not_null_conditions(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{} is not null", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Serializes a descriptor into a `CREATE TABLE` statement.
///
/// Clause order is columns, `UNIQUE` groups, extra constraints, then
/// foreign keys.
pub fn create_table_sql(
    descriptor: &TableDescriptor,
    name: &str,
    if_not_exists: bool,
    options: &StatementOptions,
) -> String {
    let mut body: Vec<String> = descriptor
        .columns()
        .iter()
        .map(ColumnDescriptor::to_sql)
        .collect();
    body.extend(descriptor.uniques().iter().map(ToString::to_string));
    body.extend(descriptor.constraints().iter().cloned());
    body.extend(descriptor.foreign_keys().iter().map(ToString::to_string));

    format!(
        "create table{} {}({})",
        if_not_exists_clause(if_not_exists),
        options.table_name(name),
        body.join(", ")
    )
}

/// `create view [if not exists] <name> as <select>`
pub fn create_view_sql(
    select: &str,
    view_name: &str,
    if_not_exists: bool,
    options: &StatementOptions,
) -> String {
    format!(
        "create view{} {} as {}",
        if_not_exists_clause(if_not_exists),
        options.table_name(view_name),
        select
    )
}

fn if_not_exists_clause(if_not_exists: bool) -> &'static str {
    if if_not_exists { " if not exists" } else { "" }
}

/// A `SELECT` against a single table.
///
/// Starts from [`SelectQuery::all`] or [`SelectQuery::columns`]; every
/// query owns its own lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    columns: Vec<String>,
    conditions: Vec<Condition>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// `select *`
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects the named columns (or expressions).
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds a condition; conditions are joined with `and`.
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds an ordering term such as `col1 desc`.
    pub fn order_by(mut self, term: impl Into<String>) -> Self {
        self.order_by.push(term.into());
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows. Without a limit this renders as
    /// `limit -1 offset N`.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Renders `query` against `table`.
pub fn select_sql(table: &str, query: &SelectQuery, options: &StatementOptions) -> String {
    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query.columns.join(",")
    };

    let mut stmt = format!(
        "select {} from {}{}",
        columns,
        options.table_name(table),
        where_clause(&query.conditions)
    );
    if !query.order_by.is_empty() {
        stmt.push_str(" order by ");
        stmt.push_str(&query.order_by.join(","));
    }
    match (query.limit, query.offset) {
        (Some(limit), Some(offset)) => stmt.push_str(&format!(" limit {limit} offset {offset}")),
        (Some(limit), None) => stmt.push_str(&format!(" limit {limit}")),
        // offset needs a limit; -1 means unbounded
        (None, Some(offset)) => stmt.push_str(&format!(" limit -1 offset {offset}")),
        (None, None) => {}
    }
    stmt
}

/// `insert [or replace] into <table> values(?,...)`
pub fn insert_sql(
    table: &str,
    column_count: usize,
    or_replace: bool,
    options: &StatementOptions,
) -> String {
    format!(
        "insert{} into {} values({})",
        or_replace_clause(or_replace),
        options.table_name(table),
        question_marks(column_count)
    )
}

/// `insert [or replace] into <table>(a,b) values(?,?)`
///
/// Column names are quoted when they are not plain identifiers.
pub fn insert_named_sql(
    table: &str,
    columns: &[&str],
    or_replace: bool,
    options: &StatementOptions,
) -> String {
    format!(
        "insert{} into {}({}) values({})",
        or_replace_clause(or_replace),
        options.table_name(table),
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(","),
        question_marks(columns.len())
    )
}

fn or_replace_clause(or_replace: bool) -> &'static str {
    if or_replace { " or replace" } else { "" }
}

/// `delete from <table> [where ...]`
pub fn delete_sql(table: &str, conditions: &[Condition], options: &StatementOptions) -> String {
    format!(
        "delete from {}{}",
        options.table_name(table),
        where_clause(conditions)
    )
}

/// `drop table <table>`
pub fn drop_table_sql(table: &str, options: &StatementOptions) -> String {
    format!("drop table {}", options.table_name(table))
}

/// `drop view <view>`
pub fn drop_view_sql(view: &str, options: &StatementOptions) -> String {
    format!("drop view {}", options.table_name(view))
}

/// `alter table <table> add column <name> <type>`
pub fn alter_add_column_sql(
    table: &str,
    column: &ColumnDescriptor,
    options: &StatementOptions,
) -> String {
    format!(
        "alter table {} add column {}",
        options.table_name(table),
        column.to_sql()
    )
}

/// `alter table <table> drop column <column>`
///
/// Needs SQLite 3.35 or later (the bundled engine qualifies).
pub fn alter_drop_column_sql(table: &str, column: &str, options: &StatementOptions) -> String {
    format!(
        "alter table {} drop column {}",
        options.table_name(table),
        quote_identifier(column)
    )
}

/// `CASE <variable>` expression with `WHEN/THEN` lines and a final `ELSE`.
pub fn case_single_sql<W, T, E>(variable: &str, when_thens: &[(W, T)], otherwise: E) -> String
where
    W: fmt::Display,
    T: fmt::Display,
    E: fmt::Display,
{
    format!(
        "CASE {}\n{}\nELSE {}\nEND",
        variable,
        when_then_lines(when_thens),
        otherwise
    )
}

/// Searched `CASE` expression where every `WHEN` carries its own condition.
pub fn case_multi_sql<W, T, E>(when_thens: &[(W, T)], otherwise: E) -> String
where
    W: fmt::Display,
    T: fmt::Display,
    E: fmt::Display,
{
    format!("CASE\n{}\nELSE {}\nEND", when_then_lines(when_thens), otherwise)
}

fn when_then_lines<W: fmt::Display, T: fmt::Display>(when_thens: &[(W, T)]) -> String {
    when_thens
        .iter()
        .map(|(when, then)| format!("WHEN {when} THEN {then}"))
        .collect::<Vec<_>>()
        .join("\n")
}

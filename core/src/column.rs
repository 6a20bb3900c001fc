//! Column handles.
//!
//! A [`Column`] remembers the table it belongs to and its value kind, and
//! builds [`Condition`]s against other columns. [`ColumnSet`] groups the
//! columns of one table for lookup by name.

use std::fmt;

use serde::Serialize;

use crate::condition::Condition;
use crate::types::{ColumnDescriptor, TableDescriptor, ValueKind};
use crate::validate::ValidationError;

/// A named column of a specific table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    name: String,
    value_kind: ValueKind,
    table: String,
}

impl Column {
    /// Builds a handle from a parsed column.
    pub fn from_descriptor(table: impl Into<String>, column: &ColumnDescriptor) -> Self {
        Self {
            name: column.name.clone(),
            value_kind: column.value_kind,
            table: table.into(),
        }
    }

    /// Like [`from_descriptor`](Self::from_descriptor), but rejects columns
    /// whose declared type maps to [`ValueKind::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownColumnType`] for unrecognized types.
    pub fn strict(table: impl Into<String>, column: &ColumnDescriptor) -> Result<Self, ValidationError> {
        if column.value_kind == ValueKind::Unknown {
            return Err(ValidationError::UnknownColumnType {
                column: column.name.clone(),
                raw_type: column.raw_type.clone(),
            });
        }
        Ok(Self::from_descriptor(table, column))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Starts a condition on this column.
    pub fn condition(&self) -> Condition {
        Condition::new(self.name.as_str())
    }

    /// `self < other`
    pub fn lt(&self, other: &Column) -> Condition {
        self.condition().lt(&other.name)
    }

    /// `self <= other`
    pub fn le(&self, other: &Column) -> Condition {
        self.condition().le(&other.name)
    }

    /// `self > other`
    pub fn gt(&self, other: &Column) -> Condition {
        self.condition().gt(&other.name)
    }

    /// `self >= other`
    pub fn ge(&self, other: &Column) -> Condition {
        self.condition().ge(&other.name)
    }

    /// `self = other`
    #[allow(clippy::should_implement_trait)]
    pub fn eq(&self, other: &Column) -> Condition {
        self.condition().eq(&other.name)
    }

    /// `self != other`
    #[allow(clippy::should_implement_trait)]
    pub fn ne(&self, other: &Column) -> Condition {
        self.condition().ne(&other.name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value_kind)
    }
}

/// Columns of a single table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    /// Groups columns, all of which must belong to the same table.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MixedColumnTables`] if two columns name
    /// different tables.
    pub fn new(columns: Vec<Column>) -> Result<Self, ValidationError> {
        if let Some(first) = columns.first() {
            if let Some(other) = columns.iter().find(|c| c.table != first.table) {
                return Err(ValidationError::MixedColumnTables {
                    expected: first.table.clone(),
                    found: other.table.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Builds the set for every column of `descriptor`.
    pub fn from_descriptor(table: &str, descriptor: &TableDescriptor) -> Self {
        Self {
            columns: descriptor
                .columns()
                .iter()
                .map(|c| Column::from_descriptor(table, c))
                .collect(),
        }
    }

    /// Looks up a column by name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> TableDescriptor {
        TableDescriptor::builder()
            .column("a", "INTEGER")
            .column("b", "REAL")
            .column("c", "")
            .build()
            .unwrap()
    }

    #[test]
    fn test_column_comparisons() {
        let set = ColumnSet::from_descriptor("t", &desc());
        let a = set.get("a").unwrap();
        let b = set.get("b").unwrap();

        assert_eq!(a.lt(b).as_str(), "a < b");
        assert_eq!(a.ge(b).as_str(), "a >= b");
        assert_eq!(a.ne(b).as_str(), "a != b");
        assert_eq!(a.eq(b).or(a.condition().gt(5)).as_str(), "a = b OR a > 5");
    }

    #[test]
    fn test_column_set_lookup() {
        let set = ColumnSet::from_descriptor("t", &desc());
        assert_eq!(set.names(), vec!["a", "b", "c"]);
        assert_eq!(set.get("b").unwrap().value_kind(), ValueKind::Real);
        assert_eq!(set.get("a").unwrap().table(), "t");
        assert!(set.get("zzz").is_none());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_column_set_rejects_mixed_tables() {
        let d = desc();
        let columns = vec![
            Column::from_descriptor("t1", &d.columns()[0]),
            Column::from_descriptor("t2", &d.columns()[1]),
        ];
        assert_eq!(
            ColumnSet::new(columns).unwrap_err(),
            ValidationError::MixedColumnTables {
                expected: "t1".into(),
                found: "t2".into()
            }
        );
    }

    #[test]
    fn test_strict_rejects_unknown_type() {
        let d = desc();
        assert!(Column::strict("t", &d.columns()[0]).is_ok());
        let err = Column::strict("t", &d.columns()[2]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownColumnType { .. }));
    }

    #[test]
    fn test_display() {
        let d = desc();
        assert_eq!(Column::from_descriptor("t", &d.columns()[0]).to_string(), "a integer");
    }
}

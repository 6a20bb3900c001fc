//! Foreign-key relationship index.
//!
//! Maps every referenced `(parent table, parent column)` to the set of
//! `(child table, child column)` pairs that point at it. The index is
//! derived data: it can always be rebuilt by scanning each table's
//! foreign keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};
use sew_core::TableDescriptor;

/// A `table.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnRef {
    /// Table name.
    pub table: String,
    /// Column name within `table`.
    pub column: String,
}

impl ColumnRef {
    /// Creates a reference to `table.column`.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Parent column to referencing child columns.
///
/// Serializes as a list of `{parent, children}` entries ordered by parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipIndex {
    edges: BTreeMap<ColumnRef, BTreeSet<ColumnRef>>,
}

impl RelationshipIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `child -> parent` edge.
    pub fn insert(&mut self, parent: ColumnRef, child: ColumnRef) {
        self.edges.entry(parent).or_default().insert(child);
    }

    /// Records every foreign key of `table`.
    pub fn add_descriptor(&mut self, table: &str, descriptor: &TableDescriptor) {
        for fk in descriptor.foreign_keys() {
            self.insert(
                ColumnRef::new(&fk.parent_table, &fk.parent_column),
                ColumnRef::new(table, &fk.child_column),
            );
        }
    }

    /// Removes every edge whose child side is in `table`.
    ///
    /// Edges where `table` is the parent stay; the children still declare
    /// those foreign keys.
    pub fn remove_child_table(&mut self, table: &str) {
        self.edges.retain(|_, children| {
            children.retain(|child| child.table != table);
            !children.is_empty()
        });
    }

    /// Children referencing `table.column`.
    pub fn children_of(&self, table: &str, column: &str) -> Option<&BTreeSet<ColumnRef>> {
        self.edges.get(&ColumnRef::new(table, column))
    }

    /// Parent columns with their children, ordered by parent.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnRef, &BTreeSet<ColumnRef>)> {
        self.edges.iter()
    }

    /// Number of referenced parent columns.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if no foreign key is recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drops every edge, ahead of a full rebuild.
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

#[derive(Serialize)]
struct Relationship<'a> {
    parent: &'a ColumnRef,
    children: &'a BTreeSet<ColumnRef>,
}

impl Serialize for RelationshipIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            self.edges
                .iter()
                .map(|(parent, children)| Relationship { parent, children }),
        )
    }
}

//! Declarative schema model.
//!
//! A [`Schema`] maps table names to [`Table`] definitions. Tables are created
//! with [`TableBuilder`] and changed with [`AlterTableBuilder`], which yields
//! a list of [`Operation`]s that [`Table::apply`] replays.

mod alter_builder;
mod column;
mod operation;
mod table_builder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use alter_builder::{AlterTableBuilder, ColumnRef};
pub use column::{
    Column, ColumnBuilder, ColumnType, DefaultValue, bigint, binary, boolean, datetime, decimal,
    float, integer, json, string, text,
};
pub use operation::Operation;
pub use table_builder::TableBuilder;

/// Name of the auto-increment primary key added by the audit builder.
pub const ID_COLUMN: &str = "id";
/// Name of the externally visible identifier column.
pub const PUBLIC_ID_COLUMN: &str = "public_id";
/// Name of the creation timestamp column.
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Name of the update timestamp column.
pub const UPDATED_AT_COLUMN: &str = "updated_at";
/// Name of the soft-delete marker column.
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a UNIQUE index.
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    /// Creates an index definition.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within its schema.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns `true` if the table has a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Returns the primary key column, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// The accumulated set of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name (informational).
    #[serde(default)]
    pub name: String,
    /// Tables keyed by name, sorted for deterministic output.
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Returns `true` if a table with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Inserts or replaces a table.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Removes a table, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

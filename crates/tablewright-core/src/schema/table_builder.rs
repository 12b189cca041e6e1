//! Builders for new tables.

use std::collections::HashSet;

use super::column::{Column, bigint, datetime, string};
use super::{
    CREATED_AT_COLUMN, DELETED_AT_COLUMN, ID_COLUMN, Index, PUBLIC_ID_COLUMN, Schema, Table,
    UPDATED_AT_COLUMN,
};
use crate::error::{Error, Result};

/// Builds a new [`Table`] and validates it against the target schema.
///
/// # Example
///
/// ```rust
/// use tablewright_core::schema::{Schema, TableBuilder, string, text};
///
/// let schema = Schema::default();
/// let table = TableBuilder::with_audit_columns("users")
///     .column(string("name").not_null())
///     .column(text("bio"))
///     .build(&schema)
///     .unwrap();
///
/// assert!(table.has_column("public_id"));
/// assert!(table.has_column("deleted_at"));
/// ```
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    indexes: Vec<Index>,
}

impl TableBuilder {
    /// Starts a table holding only the columns added by the caller.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Starts a table pre-populated with the audit columns: an
    /// auto-increment `id`, a unique `public_id`, and `created_at`,
    /// `updated_at` and nullable `deleted_at` timestamps.
    #[must_use]
    pub fn with_audit_columns(name: impl Into<String>) -> Self {
        let name = name.into();
        let created_index = Index::new(
            format!("idx_{name}_{CREATED_AT_COLUMN}"),
            &[CREATED_AT_COLUMN, ID_COLUMN],
            false,
        );
        Self {
            name,
            columns: vec![
                bigint(ID_COLUMN).primary_key().auto_increment().build(),
                string(PUBLIC_ID_COLUMN).not_null().unique().build(),
                datetime(CREATED_AT_COLUMN).not_null().build(),
                datetime(UPDATED_AT_COLUMN).not_null().build(),
                datetime(DELETED_AT_COLUMN).nullable().build(),
            ],
            indexes: vec![created_index],
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Adds a non-unique index named `idx_<table>_<columns>`.
    #[must_use]
    pub fn index(self, columns: &[&str]) -> Self {
        let name = self.index_name(columns);
        self.named_index(name, columns, false)
    }

    /// Adds a unique index named `idx_<table>_<columns>`.
    #[must_use]
    pub fn unique_index(self, columns: &[&str]) -> Self {
        let name = self.index_name(columns);
        self.named_index(name, columns, true)
    }

    /// Adds an index with an explicit name.
    #[must_use]
    pub fn named_index(mut self, name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        self.indexes.push(Index::new(name, columns, unique));
        self
    }

    fn index_name(&self, columns: &[&str]) -> String {
        format!("idx_{}_{}", self.name, columns.join("_"))
    }

    /// Validates the definition and returns the table.
    ///
    /// Fails with [`Error::DuplicateTable`] if `schema` already holds a table
    /// of the same name.
    pub fn build(self, schema: &Schema) -> Result<Table> {
        if schema.contains(&self.name) {
            return Err(Error::DuplicateTable(self.name));
        }
        let table = Table {
            name: self.name,
            columns: self.columns,
            indexes: self.indexes,
        };
        validate_table(&table)?;
        Ok(table)
    }
}

/// Checks the structural rules every table must satisfy.
pub(crate) fn validate_table(table: &Table) -> Result<()> {
    if table.name.is_empty() {
        return Err(Error::validation("table name must not be empty"));
    }
    if table.columns.is_empty() {
        return Err(Error::validation(format!(
            "table '{}' must have at least one column",
            table.name
        )));
    }

    let mut seen = HashSet::new();
    for column in &table.columns {
        if column.name.is_empty() {
            return Err(Error::validation(format!(
                "table '{}' has a column without a name",
                table.name
            )));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(Error::validation(format!(
                "column '{}' appears twice in table '{}'",
                column.name, table.name
            )));
        }
        if column.auto_increment && !(column.primary_key && column.column_type.is_integral()) {
            return Err(Error::validation(format!(
                "column '{}.{}' can only auto increment as an integer primary key",
                table.name, column.name
            )));
        }
    }

    if table.columns.iter().filter(|c| c.primary_key).count() > 1 {
        return Err(Error::validation(format!(
            "table '{}' declares more than one primary key column",
            table.name
        )));
    }

    let mut index_names = HashSet::new();
    for index in &table.indexes {
        if !index_names.insert(index.name.as_str()) {
            return Err(Error::validation(format!(
                "index '{}' appears twice on table '{}'",
                index.name, table.name
            )));
        }
        if index.columns.is_empty() {
            return Err(Error::validation(format!(
                "index '{}' has no columns",
                index.name
            )));
        }
        for col in &index.columns {
            if !table.has_column(col) {
                return Err(Error::column_not_found(&table.name, col));
            }
        }
    }
    Ok(())
}

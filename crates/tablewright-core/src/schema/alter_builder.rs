//! Builder for changes to an existing table.

use super::column::{Column, ColumnType, DefaultValue};
use super::operation::Operation;
use super::{Index, Table};
use crate::error::{Error, Result};

/// A checked reference to a column of the table being altered.
///
/// Only [`AlterTableBuilder::column`] hands these out, so every mutation
/// call is anchored to a column that actually exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    name: String,
    column_type: ColumnType,
}

impl ColumnRef {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type at the time the reference was taken.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

/// Produces the [`Operation`] list that turns one table into another.
///
/// Every call is validated against the table as altered by the previous
/// calls. The stored table itself is not touched; applying the result is a
/// separate step ([`Table::apply`]).
///
/// # Example
///
/// ```rust
/// use tablewright_core::schema::{AlterTableBuilder, Schema, TableBuilder, string, text};
///
/// let table = TableBuilder::new("notes")
///     .column(text("body"))
///     .build(&Schema::default())
///     .unwrap();
///
/// let mut alter = AlterTableBuilder::new(&table);
/// let body = alter.column("body").unwrap();
/// alter.rename_column(body, "content").unwrap();
/// alter.add_column(string("title").not_null().default_str("")).unwrap();
/// let ops = alter.build().unwrap();
///
/// assert_eq!(ops.len(), 2);
/// assert!(table.apply(&ops).unwrap().has_column("content"));
/// ```
#[derive(Debug, Clone)]
pub struct AlterTableBuilder {
    current: Table,
    operations: Vec<Operation>,
}

impl AlterTableBuilder {
    /// Starts altering `table`.
    #[must_use]
    pub fn new(table: &Table) -> Self {
        Self {
            current: table.clone(),
            operations: Vec::new(),
        }
    }

    /// Name of the table being altered.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.current.name
    }

    /// Resolves an existing column.
    pub fn column(&self, name: &str) -> Result<ColumnRef> {
        self.current
            .column(name)
            .map(|c| ColumnRef {
                name: c.name.clone(),
                column_type: c.column_type,
            })
            .ok_or_else(|| Error::column_not_found(&self.current.name, name))
    }

    /// Adds a new column and returns a reference to it.
    pub fn add_column(&mut self, column: impl Into<Column>) -> Result<ColumnRef> {
        let column = column.into();
        let name = column.name.clone();
        self.push(Operation::AddColumn(column))?;
        self.column(&name)
    }

    /// Drops a column.
    pub fn drop_column(&mut self, column: ColumnRef) -> Result<&mut Self> {
        self.push(Operation::DropColumn {
            column: column.name,
        })
    }

    /// Renames a column and returns a reference under the new name.
    pub fn rename_column(&mut self, column: ColumnRef, new_name: &str) -> Result<ColumnRef> {
        self.push(Operation::RenameColumn {
            old_name: column.name,
            new_name: new_name.to_string(),
        })?;
        self.column(new_name)
    }

    /// Changes a column's type.
    pub fn change_type(&mut self, column: &ColumnRef, column_type: ColumnType) -> Result<&mut Self> {
        self.push(Operation::ChangeType {
            column: column.name.clone(),
            column_type,
        })
    }

    /// Changes a column's nullability.
    pub fn change_nullable(&mut self, column: &ColumnRef, nullable: bool) -> Result<&mut Self> {
        self.push(Operation::ChangeNullable {
            column: column.name.clone(),
            nullable,
        })
    }

    /// Sets (`Some`) or drops (`None`) a column's default.
    pub fn change_default(
        &mut self,
        column: &ColumnRef,
        default: Option<DefaultValue>,
    ) -> Result<&mut Self> {
        self.push(Operation::ChangeDefault {
            column: column.name.clone(),
            default,
        })
    }

    /// Adds an index over the referenced columns.
    pub fn add_index(
        &mut self,
        name: impl Into<String>,
        columns: &[&ColumnRef],
        unique: bool,
    ) -> Result<&mut Self> {
        if columns.is_empty() {
            return Err(Error::validation("an index needs at least one column"));
        }
        self.push(Operation::AddIndex(Index {
            name: name.into(),
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            unique,
        }))
    }

    /// Drops an index by name.
    pub fn drop_index(&mut self, name: &str) -> Result<&mut Self> {
        self.push(Operation::DropIndex {
            name: name.to_string(),
        })
    }

    /// Renames an index.
    pub fn rename_index(&mut self, old_name: &str, new_name: &str) -> Result<&mut Self> {
        self.push(Operation::RenameIndex {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        })
    }

    /// The table as it will look once the collected operations are applied.
    #[must_use]
    pub fn preview(&self) -> &Table {
        &self.current
    }

    /// Returns the collected operations in call order.
    ///
    /// Each call was checked as it was made; what remains is the shape of
    /// the final table, which must keep at least one column.
    pub fn build(self) -> Result<Vec<Operation>> {
        if self.current.columns.is_empty() {
            return Err(Error::validation(format!(
                "table '{}' would have no columns left",
                self.current.name
            )));
        }
        Ok(self.operations)
    }

    fn push(&mut self, operation: Operation) -> Result<&mut Self> {
        self.current.apply_one(&operation)?;
        self.operations.push(operation);
        Ok(self)
    }
}

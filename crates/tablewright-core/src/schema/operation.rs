//! Alter operations and their application to a table.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::column::{Column, ColumnType, DefaultValue};
use super::{Index, Table};
use crate::error::{Error, Result};

/// A single change to an existing table.
///
/// Operations carry only the data needed to apply themselves; dialect SQL is
/// derived from them together with the table they were built against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Add a column.
    AddColumn(Column),
    /// Drop a column by name.
    DropColumn {
        /// Column name.
        column: String,
    },
    /// Rename a column.
    RenameColumn {
        /// Current name.
        old_name: String,
        /// New name.
        new_name: String,
    },
    /// Create an index.
    AddIndex(Index),
    /// Drop an index by name.
    DropIndex {
        /// Index name.
        name: String,
    },
    /// Rename an index.
    RenameIndex {
        /// Current name.
        old_name: String,
        /// New name.
        new_name: String,
    },
    /// Change a column's base type.
    ChangeType {
        /// Column name.
        column: String,
        /// New type.
        column_type: ColumnType,
    },
    /// Change a column's nullability.
    ChangeNullable {
        /// Column name.
        column: String,
        /// Whether NULL becomes allowed.
        nullable: bool,
    },
    /// Set or clear a column's default.
    ChangeDefault {
        /// Column name.
        column: String,
        /// New default; `None` drops it.
        default: Option<DefaultValue>,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn(col) => write!(f, "ADD COLUMN {}", col.name),
            Self::DropColumn { column } => write!(f, "DROP COLUMN {column}"),
            Self::RenameColumn { old_name, new_name } => {
                write!(f, "RENAME COLUMN {old_name} TO {new_name}")
            }
            Self::AddIndex(index) => write!(f, "ADD INDEX {}", index.name),
            Self::DropIndex { name } => write!(f, "DROP INDEX {name}"),
            Self::RenameIndex { old_name, new_name } => {
                write!(f, "RENAME INDEX {old_name} TO {new_name}")
            }
            Self::ChangeType {
                column,
                column_type,
            } => write!(f, "CHANGE TYPE OF {column} TO {column_type}"),
            Self::ChangeNullable { column, nullable } => {
                if *nullable {
                    write!(f, "DROP NOT NULL ON {column}")
                } else {
                    write!(f, "SET NOT NULL ON {column}")
                }
            }
            Self::ChangeDefault { column, default } => match default {
                Some(value) => write!(f, "SET DEFAULT {} ON {column}", value.to_sql()),
                None => write!(f, "DROP DEFAULT ON {column}"),
            },
        }
    }
}

impl Table {
    /// Replays `operations` on a copy of this table and returns the result.
    ///
    /// The receiver is never modified, so the "before" shape stays available
    /// to the dialects that need it.
    pub fn apply(&self, operations: &[Operation]) -> Result<Self> {
        let mut after = self.clone();
        for operation in operations {
            after.apply_one(operation)?;
        }
        Ok(after)
    }

    pub(super) fn apply_one(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::AddColumn(column) => {
                if self.column(&column.name).is_some() {
                    return Err(Error::validation(format!(
                        "column '{}' already exists in table '{}'",
                        column.name, self.name
                    )));
                }
                self.columns.push(column.clone());
            }
            Operation::DropColumn { column } => {
                let pos = self.column_position(column)?;
                self.columns.remove(pos);
                self.indexes
                    .retain(|index| !index.columns.iter().any(|c| c == column));
            }
            Operation::RenameColumn { old_name, new_name } => {
                if self.column(new_name).is_some() {
                    return Err(Error::validation(format!(
                        "column '{new_name}' already exists in table '{}'",
                        self.name
                    )));
                }
                let pos = self.column_position(old_name)?;
                self.columns[pos].name.clone_from(new_name);
                for index in &mut self.indexes {
                    for col in &mut index.columns {
                        if col == old_name {
                            col.clone_from(new_name);
                        }
                    }
                }
            }
            Operation::AddIndex(index) => {
                if self.index(&index.name).is_some() {
                    return Err(Error::validation(format!(
                        "index '{}' already exists on table '{}'",
                        index.name, self.name
                    )));
                }
                for col in &index.columns {
                    self.column_position(col)?;
                }
                self.indexes.push(index.clone());
            }
            Operation::DropIndex { name } => {
                let pos = self.index_position(name)?;
                self.indexes.remove(pos);
            }
            Operation::RenameIndex { old_name, new_name } => {
                if self.index(new_name).is_some() {
                    return Err(Error::validation(format!(
                        "index '{new_name}' already exists on table '{}'",
                        self.name
                    )));
                }
                let pos = self.index_position(old_name)?;
                self.indexes[pos].name.clone_from(new_name);
            }
            Operation::ChangeType {
                column,
                column_type,
            } => {
                let pos = self.column_position(column)?;
                self.columns[pos].column_type = *column_type;
            }
            Operation::ChangeNullable { column, nullable } => {
                let pos = self.column_position(column)?;
                self.columns[pos].nullable = *nullable;
            }
            Operation::ChangeDefault { column, default } => {
                let pos = self.column_position(column)?;
                self.columns[pos].default.clone_from(default);
            }
        }
        Ok(())
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    fn index_position(&self, name: &str) -> Result<usize> {
        self.indexes.iter().position(|i| i.name == name).ok_or_else(|| {
            Error::validation(format!(
                "index '{name}' does not exist on table '{}'",
                self.name
            ))
        })
    }
}

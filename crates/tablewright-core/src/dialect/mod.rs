//! Dialect-specific SQL synthesis.
//!
//! [`Dialect`] is a closed set. Every concern (quoting, placeholders, the
//! current-time expression, DDL) is a `match` over it that forwards to the
//! per-dialect module.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{ColumnType, DefaultValue, Index, Operation, Table};

/// A supported database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL 8.
    #[serde(rename = "mysql")]
    MySql,
    /// SQLite 3.35 or later.
    Sqlite,
}

impl Dialect {
    /// All dialects, in snapshot field order.
    pub const ALL: [Self; 3] = [Self::Postgres, Self::MySql, Self::Sqlite];

    /// Lowercase dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        let q = match self {
            Self::Postgres | Self::Sqlite => '"',
            Self::MySql => '`',
        };
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Returns the placeholder for the `n`th (1-based) bound parameter.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::MySql | Self::Sqlite => String::from("?"),
        }
    }

    /// Returns `true` if placeholders are numbered, so one bound value can
    /// be referenced several times.
    #[must_use]
    pub const fn numbered_placeholders(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// The expression evaluating to the current time.
    #[must_use]
    pub const fn now(self) -> &'static str {
        match self {
            Self::Postgres | Self::MySql => "NOW()",
            Self::Sqlite => "datetime('now')",
        }
    }

    /// Returns `true` if INSERT … RETURNING is available.
    #[must_use]
    pub const fn supports_returning(self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }

    /// Maps a column type to this dialect's type name.
    #[must_use]
    pub const fn column_type(self, column_type: ColumnType) -> &'static str {
        match self {
            Self::Postgres => postgres::type_name(column_type),
            Self::MySql => mysql::type_name(column_type),
            Self::Sqlite => sqlite::type_name(column_type),
        }
    }

    /// Renders a default value in this dialect.
    #[must_use]
    pub fn render_default(self, default: &DefaultValue, column_type: ColumnType) -> String {
        match self {
            Self::Postgres => postgres::render_default(default),
            Self::MySql => mysql::render_default(default, column_type),
            Self::Sqlite => sqlite::render_default(default),
        }
    }

    /// Generates the statements creating `table` and its indexes.
    pub fn create_table(self, table: &Table) -> Result<Vec<String>> {
        match self {
            Self::Postgres => Ok(postgres::create_table(table)),
            Self::MySql => mysql::create_table(table),
            Self::Sqlite => Ok(sqlite::create_table(table)),
        }
    }

    /// Generates the statements applying `operations` to `before`.
    ///
    /// `before` is the table the operations were built against. It is only
    /// read; dialects that need the resulting shape replay the operations on
    /// a copy.
    pub fn alter_table(
        self,
        name: &str,
        operations: &[Operation],
        before: &Table,
    ) -> Result<Vec<String>> {
        if before.name != name {
            return Err(Error::validation(format!(
                "alter of '{name}' was given the definition of '{}'",
                before.name
            )));
        }
        replay(before, operations, |operation, current| {
            check_portable(self, current, operation)
        })?;
        match self {
            Self::Postgres => postgres::alter_table(operations, before),
            Self::MySql => mysql::alter_table(operations, before),
            Self::Sqlite => sqlite::alter_table(operations, before),
        }
    }

    /// Generates the statement dropping a table.
    #[must_use]
    pub fn drop_table(self, name: &str) -> Vec<String> {
        vec![format!("DROP TABLE {}", self.quote_identifier(name))]
    }

    /// Generates the CREATE INDEX statement for `index` on `table`.
    pub fn create_index(self, table: &Table, index: &Index) -> Result<String> {
        match self {
            Self::MySql => mysql::create_index(table, index),
            Self::Postgres | Self::Sqlite => Ok(generic_create_index(self, &table.name, index)),
        }
    }

    /// Joins statements into one script, each terminated by `;`.
    #[must_use]
    pub fn join(statements: &[String]) -> String {
        statements
            .iter()
            .map(|s| format!("{s};"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(Error::validation(format!("unknown dialect '{other}'"))),
        }
    }
}

/// Rejections shared by every dialect. Rebuilding a table cannot help with
/// any of these.
fn check_portable(dialect: Dialect, current: &Table, operation: &Operation) -> Result<()> {
    let unsupported = |reason: &str| Error::UnsupportedOperation {
        dialect,
        operation: format!("{operation} on {} ({reason})", current.name),
    };
    match operation {
        Operation::AddColumn(column) if column.primary_key => {
            Err(unsupported("primary key columns can only be declared at creation"))
        }
        Operation::AddColumn(column) if column.auto_increment => {
            Err(unsupported("auto increment columns can only be declared at creation"))
        }
        Operation::AddColumn(column) if !column.nullable && column.default.is_none() => Err(
            unsupported("existing rows need a default for a NOT NULL column"),
        ),
        Operation::ChangeType { column, .. } if is_primary_key(current, column) => {
            Err(unsupported("the primary key type is fixed"))
        }
        Operation::ChangeNullable {
            column,
            nullable: true,
        } if is_primary_key(current, column) => {
            Err(unsupported("the primary key cannot become nullable"))
        }
        Operation::DropColumn { column } if is_primary_key(current, column) => {
            Err(unsupported("the primary key cannot be dropped"))
        }
        _ => Ok(()),
    }
}

/// Operations are checked against the progressively altered table, so a
/// column renamed earlier in the list is found under its new name.
fn is_primary_key(current: &Table, column: &str) -> bool {
    current.column(column).is_some_and(|c| c.primary_key)
}

/// CREATE [UNIQUE] INDEX shared by Postgres and SQLite.
fn generic_create_index(dialect: Dialect, table: &str, index: &Index) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    sql.push_str(&dialect.quote_identifier(&index.name));
    sql.push_str(" ON ");
    sql.push_str(&dialect.quote_identifier(table));
    sql.push_str(" (");
    let cols: Vec<String> = index
        .columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect();
    sql.push_str(&cols.join(", "));
    sql.push(')');
    sql
}

/// Walks `operations`, handing each one to `emit` together with the table
/// state it applies to.
fn replay<F>(before: &Table, operations: &[Operation], mut emit: F) -> Result<Table>
where
    F: FnMut(&Operation, &Table) -> Result<()>,
{
    let mut current = before.clone();
    for operation in operations {
        emit(operation, &current)?;
        current = current.apply(std::slice::from_ref(operation))?;
    }
    Ok(current)
}

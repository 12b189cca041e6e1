//! Error types for schema building, SQL synthesis and code generation.

use crate::dialect::Dialect;

/// Errors raised while building schema changes or generating SQL.
///
/// Every variant is structural: it is detected before any database I/O and
/// means nothing was applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A table with this name already exists in the target schema.
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// An alter or drop referenced a table that does not exist.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// A column reference does not resolve against the table.
    #[error("column '{column}' does not exist in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The dialect cannot express the operation, not even by rebuilding
    /// the table.
    #[error("{dialect} cannot express {operation}")]
    UnsupportedOperation {
        /// Dialect that rejected the operation.
        dialect: Dialect,
        /// Human readable description of the operation.
        operation: String,
    },

    /// Malformed input: invalid table definition, bad generator
    /// configuration, etc.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        Self::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

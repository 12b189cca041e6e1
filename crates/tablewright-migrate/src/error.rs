//! Error types for the migration engine.

use std::path::PathBuf;

/// Errors that can occur while planning, applying or inspecting migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A structural error raised while building a migration or generating
    /// SQL. Nothing touched the database.
    #[error(transparent)]
    Core(#[from] tablewright_core::Error),

    /// A migration name does not have the `<14 digits>_<snake_case>` shape.
    #[error("invalid migration name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two registered migrations share a version.
    #[error("migrations '{first}' and '{second}' share version {version}")]
    DuplicateVersion {
        /// The shared 14-digit version.
        version: u64,
        /// First migration with this version.
        first: String,
        /// Second migration with this version.
        second: String,
    },

    /// A statement failed while applying a migration. The migration's
    /// transaction was rolled back.
    #[error("migration '{migration}' failed on statement `{statement}`: {source}")]
    SqlExecution {
        /// The migration being applied.
        migration: String,
        /// The literal statement that failed.
        statement: String,
        /// Driver error.
        source: sqlx::Error,
    },

    /// A history row holds an `applied_at` value that is not a timestamp.
    #[error("migration '{name}' has an unreadable applied_at value '{value}'")]
    InvalidTimestamp {
        /// Migration name of the row.
        name: String,
        /// The stored value.
        value: String,
    },

    /// Database error outside of a migration statement.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The snapshot file is malformed.
    #[error("failed to read snapshot '{path}': {message}")]
    Snapshot {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error (reading/writing the snapshot or configuration).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or command line usage.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error while printing generated output.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

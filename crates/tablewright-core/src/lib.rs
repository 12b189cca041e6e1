//! # tablewright-core
//!
//! Schema model, dialect SQL synthesis and CRUD generation for Postgres,
//! MySQL and SQLite. Nothing in this crate performs I/O.
//!
//! This crate provides:
//! - A table/column/index model with builders for creating and altering
//!   tables ([`schema`])
//! - DDL synthesis for each dialect, including SQLite's table rebuild
//!   ([`dialect`])
//! - Cross-dialect type normalization and table comparison ([`normalize`])
//! - CRUD statements with keyset pagination ([`crud`])
//!
//! ## Creating and altering a table
//!
//! ```rust
//! use tablewright_core::dialect::Dialect;
//! use tablewright_core::schema::{AlterTableBuilder, ColumnType, Schema, TableBuilder, string, text};
//!
//! let table = TableBuilder::with_audit_columns("users")
//!     .column(string("name").not_null())
//!     .column(text("bio"))
//!     .build(&Schema::default())
//!     .unwrap();
//!
//! let mut alter = AlterTableBuilder::new(&table);
//! let bio = alter.column("bio").unwrap();
//! alter.change_type(&bio, ColumnType::String).unwrap();
//! let ops = alter.build().unwrap();
//!
//! // SQLite cannot change a column type in place, so the table is rebuilt.
//! let sql = Dialect::Sqlite.alter_table("users", &ops, &table).unwrap();
//! assert!(sql[0].starts_with("CREATE TABLE \"__tablewright_new_users\""));
//!
//! let sql = Dialect::Postgres.alter_table("users", &ops, &table).unwrap();
//! assert_eq!(sql.len(), 1);
//! ```

pub mod crud;
pub mod dialect;
pub mod error;
pub mod normalize;
pub mod schema;

pub use crud::{CrudBundle, CrudKind, CrudOptions, generate};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use schema::{
    AlterTableBuilder, Column, ColumnType, DefaultValue, Index, Operation, Schema, Table,
    TableBuilder,
};

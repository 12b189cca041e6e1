//! Transactional schema migrations for Postgres, MySQL and SQLite.
//!
//! `tablewright-migrate` applies migrations defined in Rust code:
//! - Each migration builds its changes against the schema accumulated by
//!   the migrations before it, so referencing a missing table or column
//!   fails before anything touches the database
//! - SQL is generated for all three dialects and recorded in a snapshot
//! - Each migration runs in its own transaction and is logged in the
//!   `tablewright_migrations` table
//!
//! # Architecture
//!
//! - **Name** - `<14-digit timestamp>_<snake_case>` migration names
//! - **Plan** - Migration trait, per-migration context, accumulated schema
//! - **Snapshot** - JSON persistence of the plan
//! - **History** - The applied-migrations log
//! - **Executor** - Applies pending migrations through sqlx
//! - **Introspect** - Reads live tables back for verification
//! - **Config** - `tablewright.toml` options for CRUD generation
//!
//! # Example
//!
//! ```rust
//! use tablewright_core::schema::{TableBuilder, string, text};
//! use tablewright_migrate::prelude::*;
//!
//! struct CreateUsers;
//!
//! impl Migration for CreateUsers {
//!     const NAME: &'static str = "20240101000000_create_users";
//!
//!     fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
//!         ctx.create_table(
//!             TableBuilder::with_audit_columns("users").column(string("name").not_null()),
//!         )
//!     }
//! }
//!
//! struct AddBio;
//!
//! impl Migration for AddBio {
//!     const NAME: &'static str = "20240102000000_add_bio";
//!
//!     fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
//!         ctx.alter_table("users", |t| {
//!             t.add_column(text("bio"))?;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let migrations = [
//!     RegisteredMigration::new::<AddBio>(),
//!     RegisteredMigration::new::<CreateUsers>(),
//! ];
//! let mut executor = MigrationExecutor::connect("sqlite::memory:").await.unwrap();
//! let report = executor.run(&migrations).await.unwrap();
//! assert_eq!(report.applied, vec![CreateUsers::NAME, AddBio::NAME]);
//! # });
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod introspect;
pub mod name;
pub mod plan;
pub mod snapshot;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::GeneratorConfig;
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{MigrationExecutor, MigrationStatus, RunReport};
    pub use crate::history::MigrationHistory;
    pub use crate::name::MigrationName;
    pub use crate::plan::{
        Instructions, Migration, MigrationContext, MigrationPlan, MigrationRecord,
        PreparedMigration, RegisteredMigration,
    };
    pub use crate::snapshot::Snapshot;
}

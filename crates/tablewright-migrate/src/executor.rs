//! Migration executor.
//!
//! Applies pending migrations against a database, one transaction per
//! migration, in ascending version order. After each commit the snapshot is
//! rewritten so it always matches what the database has applied.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{AnyConnection, Connection};
use tablewright_core::dialect::Dialect;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::MigrationHistory;
use crate::name::MigrationName;
use crate::plan::{MigrationPlan, RegisteredMigration, ordered};
use crate::snapshot::Snapshot;

/// Outcome of [`MigrationExecutor::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Migrations applied (or, in dry-run mode, that would be applied), in
    /// order.
    pub applied: Vec<String>,
    /// Number of migration statements executed (or printed).
    pub statements: usize,
}

/// Status of a registered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migration name.
    pub name: String,
    /// Whether the database log records it.
    pub applied: bool,
    /// When it was applied.
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether the snapshot records it.
    pub in_snapshot: bool,
}

/// Where the statements of a pending migration come from.
enum Source {
    /// The snapshot already records the migration, planned by an earlier
    /// run against another database. Its stored SQL is replayed.
    Recorded(Vec<String>),
    /// New migration; its SQL is generated against the accumulated schema.
    Prepared(Box<crate::plan::PreparedMigration>),
}

/// Executes migrations against a database.
pub struct MigrationExecutor {
    conn: AnyConnection,
    dialect: Dialect,
    history: MigrationHistory,
    snapshot: Option<Snapshot>,
    dry_run: bool,
}

impl MigrationExecutor {
    /// Connects to `url` (`postgres://`, `mysql://` or `sqlite:`).
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        Self::new(conn)
    }

    /// Wraps an open connection. The dialect follows its backend.
    pub fn new(conn: AnyConnection) -> Result<Self> {
        let dialect = Dialect::from_str(conn.backend_name())?;
        debug!(%dialect, "Using dialect");
        Ok(Self {
            conn,
            dialect,
            history: MigrationHistory::new(dialect),
            snapshot: None,
            dry_run: false,
        })
    }

    /// Persists the plan to `snapshot` after every migration. Without a
    /// snapshot each run starts from an empty plan.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }

    /// Loads the plan from the snapshot, or an empty one.
    pub fn load_plan(&self) -> Result<MigrationPlan> {
        match &self.snapshot {
            Some(snapshot) => snapshot.load_or_default(),
            None => Ok(MigrationPlan::new()),
        }
    }

    fn save_plan(&self, plan: &MigrationPlan) -> Result<()> {
        match &self.snapshot {
            Some(snapshot) => snapshot.save(plan),
            None => Ok(()),
        }
    }

    /// Applied migration names. In dry-run mode a missing history table
    /// reads as empty instead of being created.
    async fn applied_names(&mut self) -> Result<HashSet<String>> {
        if self.dry_run {
            if !self.history.exists(&mut self.conn).await? {
                return Ok(HashSet::new());
            }
        } else {
            self.history.ensure_table(&mut self.conn).await?;
        }
        self.history.applied_names(&mut self.conn).await
    }

    /// Pending migrations in ascending version order.
    pub async fn pending<'a>(
        &mut self,
        migrations: &'a [RegisteredMigration],
    ) -> Result<Vec<(MigrationName, &'a RegisteredMigration)>> {
        let ordered = ordered(migrations)?;
        let applied = self.applied_names().await?;
        Ok(ordered
            .into_iter()
            .filter(|(name, _)| !applied.contains(name.as_str()))
            .collect())
    }

    /// Applies every pending migration.
    ///
    /// Stops at the first failure: that migration's transaction is rolled
    /// back, earlier migrations stay committed, and the snapshot reflects
    /// exactly the committed ones.
    pub async fn run(&mut self, migrations: &[RegisteredMigration]) -> Result<RunReport> {
        let mut plan = self.load_plan()?;
        let ordered = ordered(migrations)?;
        let applied = self.applied_names().await?;
        let mut report = RunReport::default();

        // Applied migrations the plan does not record (no snapshot attached,
        // or a save that failed) are folded in without being executed.
        let mut pending = Vec::new();
        let mut rebuilt = false;
        for (name, migration) in ordered {
            if !applied.contains(name.as_str()) {
                pending.push((name, migration));
            } else if !plan.contains(name.as_str()) {
                debug!(name = %name, "Rebuilding schema of applied migration");
                let prepared = plan.prepare(migration)?;
                plan.commit(prepared);
                rebuilt = true;
            }
        }
        if rebuilt && !self.dry_run {
            self.save_plan(&plan)?;
        }

        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(report);
        }
        info!(count = pending.len(), dry_run = self.dry_run, "Applying migrations");

        for (name, migration) in pending {
            let source = match plan.migration(name.as_str()) {
                Some(record) => Source::Recorded(record.instructions.get(self.dialect).to_vec()),
                None => Source::Prepared(Box::new(plan.prepare(migration)?)),
            };
            let statements = match &source {
                Source::Recorded(statements) => statements.as_slice(),
                Source::Prepared(prepared) => prepared.statements(self.dialect),
            };

            if self.dry_run {
                println!("-- {name}");
                for sql in statements {
                    println!("{sql};");
                }
            } else {
                self.apply_one(&name, statements).await?;
            }
            report.statements += statements.len();
            report.applied.push(name.to_string());

            if let Source::Prepared(prepared) = source {
                plan.commit(*prepared);
                if !self.dry_run {
                    self.save_plan(&plan)?;
                }
            }
        }

        info!(
            applied = report.applied.len(),
            statements = report.statements,
            "Migrations complete"
        );
        Ok(report)
    }

    /// Runs one migration in its own transaction.
    async fn apply_one(&mut self, name: &MigrationName, statements: &[String]) -> Result<()> {
        info!(name = %name, "Applying migration");
        let mut tx = self.conn.begin().await?;

        for sql in statements {
            debug!(sql = %sql, "Executing SQL");
            if let Err(source) = sqlx::raw_sql(sql).execute(&mut *tx).await {
                warn!(name = %name, error = %source, "Migration failed, rolling back");
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback failed");
                }
                return Err(MigrateError::SqlExecution {
                    migration: name.to_string(),
                    statement: sql.clone(),
                    source,
                });
            }
        }

        self.history.record_applied(&mut tx, name.as_str()).await?;
        tx.commit().await?;
        info!(name = %name, "Migration applied successfully");
        Ok(())
    }

    /// Status of every registered migration, in version order.
    pub async fn status(&mut self, migrations: &[RegisteredMigration]) -> Result<Vec<MigrationStatus>> {
        let plan = self.load_plan()?;
        let applied = if self.history.exists(&mut self.conn).await? {
            self.history.get_applied(&mut self.conn).await?
        } else {
            Vec::new()
        };

        Ok(ordered(migrations)?
            .into_iter()
            .map(|(name, _)| {
                let entry = applied.iter().find(|a| a.name == name.as_str());
                MigrationStatus {
                    name: name.to_string(),
                    applied: entry.is_some(),
                    applied_at: entry.map(|a| a.applied_at),
                    in_snapshot: plan.contains(name.as_str()),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Instructions, Migration, MigrationContext};
    use tablewright_core::schema::{TableBuilder, integer, string};

    struct CreateItems;
    impl Migration for CreateItems {
        const NAME: &'static str = "20240101000000_create_items";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.create_table(
                TableBuilder::new("items")
                    .column(integer("id").primary_key().auto_increment())
                    .column(string("label").not_null()),
            )
        }
    }

    struct BrokenSeed;
    impl Migration for BrokenSeed {
        const NAME: &'static str = "20240102000000_broken_seed";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.create_table(TableBuilder::new("seeded").column(integer("id").primary_key()))?;
            ctx.raw_sql(Instructions::portable("INSERT INTO missing_table VALUES (1)"));
            Ok(())
        }
    }

    async fn memory_executor() -> MigrationExecutor {
        MigrationExecutor::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite")
    }

    async fn table_exists(executor: &mut MigrationExecutor, table: &str) -> bool {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(executor.connection())
                .await
                .unwrap();
        row.is_some()
    }

    #[tokio::test]
    async fn detects_sqlite_dialect() {
        let executor = memory_executor().await;
        assert_eq!(executor.dialect(), Dialect::Sqlite);
    }

    #[tokio::test]
    async fn applies_and_records() {
        let mut executor = memory_executor().await;
        let migrations = [RegisteredMigration::new::<CreateItems>()];

        let report = executor.run(&migrations).await.unwrap();
        assert_eq!(report.applied, vec![CreateItems::NAME]);
        assert_eq!(report.statements, 1);
        assert!(table_exists(&mut executor, "items").await);

        let status = executor.status(&migrations).await.unwrap();
        assert!(status[0].applied);
        assert!(!status[0].in_snapshot);
    }

    #[tokio::test]
    async fn second_run_executes_nothing() {
        let mut executor = memory_executor().await;
        let migrations = [RegisteredMigration::new::<CreateItems>()];
        executor.run(&migrations).await.unwrap();

        let report = executor.run(&migrations).await.unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[tokio::test]
    async fn failure_rolls_back_the_migration() {
        let mut executor = memory_executor().await;
        let migrations = [
            RegisteredMigration::new::<BrokenSeed>(),
            RegisteredMigration::new::<CreateItems>(),
        ];

        let err = executor.run(&migrations).await.unwrap_err();
        match err {
            MigrateError::SqlExecution {
                migration,
                statement,
                ..
            } => {
                assert_eq!(migration, BrokenSeed::NAME);
                assert_eq!(statement, "INSERT INTO missing_table VALUES (1)");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(table_exists(&mut executor, "items").await);
        assert!(!table_exists(&mut executor, "seeded").await);
        let status = executor.status(&migrations).await.unwrap();
        assert!(status[0].applied);
        assert!(!status[1].applied);
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let mut executor = memory_executor().await.dry_run(true);
        let migrations = [RegisteredMigration::new::<CreateItems>()];

        let report = executor.run(&migrations).await.unwrap();
        assert_eq!(report.applied, vec![CreateItems::NAME]);
        assert!(!table_exists(&mut executor, "items").await);
        assert!(!table_exists(&mut executor, "tablewright_migrations").await);
    }
}

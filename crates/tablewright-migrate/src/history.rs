//! Applied-migrations log.
//!
//! This module manages the `tablewright_migrations` table that records which
//! migrations have been applied to the database. Entries are only ever
//! inserted, inside the transaction of the migration they record.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::AnyConnection;
use tablewright_core::dialect::Dialect;

use crate::error::{MigrateError, Result};

/// Name of the history table.
pub const HISTORY_TABLE: &str = "tablewright_migrations";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Reads and writes the history table in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct MigrationHistory {
    dialect: Dialect,
}

impl MigrationHistory {
    /// Creates a history manager for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn table(&self) -> String {
        self.dialect.quote_identifier(HISTORY_TABLE)
    }

    /// SQL creating the history table if it does not exist.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let q = |name: &str| self.dialect.quote_identifier(name);
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) NOT NULL PRIMARY KEY, {} VARCHAR(64) NOT NULL)",
            self.table(),
            q("name"),
            q("applied_at")
        )
    }

    /// Ensures the history table exists.
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> Result<()> {
        sqlx::query(&self.create_table_sql()).execute(conn).await?;
        Ok(())
    }

    /// Returns `true` if the history table exists.
    pub async fn exists(&self, conn: &mut AnyConnection) -> Result<bool> {
        let sql = match self.dialect {
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Dialect::MySql => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?"
            }
        };
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(HISTORY_TABLE)
            .fetch_one(conn)
            .await?;
        Ok(count > 0)
    }

    /// Records a migration as applied.
    ///
    /// Pass the migration's transaction so the entry commits or rolls back
    /// together with its statements.
    pub async fn record_applied(&self, conn: &mut AnyConnection, name: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.table(),
            self.dialect.quote_identifier("name"),
            self.dialect.quote_identifier("applied_at"),
            self.dialect.placeholder(1),
            self.dialect.placeholder(2)
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Gets all applied migrations, ordered by name (and so by version).
    pub async fn get_applied(&self, conn: &mut AnyConnection) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT {}, {} FROM {} ORDER BY {}",
            self.dialect.quote_identifier("name"),
            self.dialect.quote_identifier("applied_at"),
            self.table(),
            self.dialect.quote_identifier("name"),
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(conn).await?;

        rows.into_iter()
            .map(|(name, value)| match parse_timestamp(&value) {
                Some(applied_at) => Ok(AppliedMigration { name, applied_at }),
                None => Err(MigrateError::InvalidTimestamp { name, value }),
            })
            .collect()
    }

    /// Gets the set of applied migration names.
    ///
    /// Only names are read, so a damaged `applied_at` does not stop
    /// migrations from running.
    pub async fn applied_names(&self, conn: &mut AnyConnection) -> Result<HashSet<String>> {
        let sql = format!(
            "SELECT {} FROM {}",
            self.dialect.quote_identifier("name"),
            self.table(),
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(conn).await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

/// Parses a stored timestamp. Rows written by hand may use the SQL
/// `YYYY-MM-DD HH:MM:SS` form instead of RFC 3339.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    async fn memory_connection() -> AnyConnection {
        sqlx::any::install_default_drivers();
        AnyConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite")
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let mut conn = memory_connection().await;
        let history = MigrationHistory::new(Dialect::Sqlite);

        assert!(!history.exists(&mut conn).await.unwrap());
        history.ensure_table(&mut conn).await.unwrap();
        history.ensure_table(&mut conn).await.unwrap();
        assert!(history.exists(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn records_and_lists_applied() {
        let mut conn = memory_connection().await;
        let history = MigrationHistory::new(Dialect::Sqlite);
        history.ensure_table(&mut conn).await.unwrap();

        history
            .record_applied(&mut conn, "20240102000000_add_email")
            .await
            .unwrap();
        history
            .record_applied(&mut conn, "20240101000000_initial")
            .await
            .unwrap();

        let applied = history.get_applied(&mut conn).await.unwrap();
        let names: Vec<_> = applied.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["20240101000000_initial", "20240102000000_add_email"]
        );
        assert!(applied[0].applied_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn duplicate_entry_is_rejected() {
        let mut conn = memory_connection().await;
        let history = MigrationHistory::new(Dialect::Sqlite);
        history.ensure_table(&mut conn).await.unwrap();

        history
            .record_applied(&mut conn, "20240101000000_initial")
            .await
            .unwrap();
        assert!(history
            .record_applied(&mut conn, "20240101000000_initial")
            .await
            .is_err());
    }

    #[test]
    fn parses_both_timestamp_forms() {
        let rfc = parse_timestamp("2024-01-01T12:00:00+00:00");
        let sql = parse_timestamp("2024-01-01 12:00:00");
        assert!(rfc.is_some());
        assert_eq!(rfc, sql);
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[tokio::test]
    async fn unreadable_timestamp_is_reported() {
        let mut conn = memory_connection().await;
        let history = MigrationHistory::new(Dialect::Sqlite);
        history.ensure_table(&mut conn).await.unwrap();
        sqlx::query(
            "INSERT INTO tablewright_migrations (name, applied_at) \
             VALUES ('20240101000000_initial', 'yesterday')",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let err = history.get_applied(&mut conn).await.unwrap_err();
        assert!(matches!(
            err,
            MigrateError::InvalidTimestamp { ref value, .. } if value == "yesterday"
        ));
        let names = history.applied_names(&mut conn).await.unwrap();
        assert!(names.contains("20240101000000_initial"));
    }

    #[test]
    fn create_sql_per_dialect() {
        let pg = MigrationHistory::new(Dialect::Postgres).create_table_sql();
        assert!(pg.starts_with("CREATE TABLE IF NOT EXISTS \"tablewright_migrations\""));
        let my = MigrationHistory::new(Dialect::MySql).create_table_sql();
        assert!(my.contains("`name` VARCHAR(255) NOT NULL PRIMARY KEY"));
    }
}

//! Command-line interface.
//!
//! Applications embed the CLI by passing their registered migrations:
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tablewright_migrate::cli::run(&[
//!         RegisteredMigration::new::<CreateUsers>(),
//!         RegisteredMigration::new::<AddBio>(),
//!     ])
//!     .await?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tablewright_core::crud::generate;
use tablewright_core::dialect::Dialect;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::{DEFAULT_CONFIG_PATH, GeneratorConfig};
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::introspect::verify_table;
use crate::plan::{MigrationPlan, RegisteredMigration};
use crate::snapshot::{DEFAULT_SNAPSHOT_PATH, Snapshot};

/// Schema migrations and CRUD generation for Postgres, MySQL and SQLite.
#[derive(Debug, Parser)]
#[command(name = "tablewright")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database URL (`postgres://`, `mysql://` or `sqlite:`).
    #[arg(short, long, env = "DATABASE_URL")]
    pub database: Option<String>,

    /// Snapshot file.
    #[arg(short, long, default_value = DEFAULT_SNAPSHOT_PATH)]
    pub snapshot: PathBuf,

    /// Generator configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply pending migrations.
    Migrate {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status.
    Status,

    /// Print the SQL recorded in the snapshot.
    Sql {
        /// Dialect to print (all if not specified).
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Migration name (all if not specified).
        #[arg(short, long)]
        migration: Option<String>,
    },

    /// Print generated CRUD statements as JSON.
    Crud {
        /// Table name (all if not specified).
        #[arg(short, long)]
        table: Option<String>,

        /// Dialect (those of the configuration file if not specified).
        #[arg(long)]
        dialect: Option<Dialect>,
    },

    /// Compare a live table with the snapshot.
    Verify {
        /// Table name.
        #[arg(short, long)]
        table: String,
    },
}

/// Parses the process arguments and runs the command.
pub async fn run(migrations: &[RegisteredMigration]) -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli, migrations).await
}

/// Installs the global subscriber.
pub fn init_tracing(verbose: bool) {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Global subscriber already installed");
    }
}

/// Runs a parsed command.
pub async fn execute(cli: Cli, migrations: &[RegisteredMigration]) -> Result<()> {
    let snapshot = Snapshot::new(&cli.snapshot);

    match cli.command {
        Commands::Migrate { dry_run } => {
            if migrations.is_empty() {
                warn!("No migrations registered");
                return Ok(());
            }
            let mut executor = connect(cli.database.as_deref())
                .await?
                .with_snapshot(snapshot)
                .dry_run(dry_run);
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let report = executor.run(migrations).await?;
            info!(
                applied = report.applied.len(),
                statements = report.statements,
                "Done"
            );
        }

        Commands::Status => {
            let mut executor = connect(cli.database.as_deref())
                .await?
                .with_snapshot(snapshot.clone());
            let statuses = executor.status(migrations).await?;
            let plan = snapshot.load_or_default()?;
            print_status(&statuses, &plan);
        }

        Commands::Sql { dialect, migration } => {
            let plan = require_plan(&snapshot)?;
            let dialects = match dialect {
                Some(dialect) => vec![dialect],
                None => Dialect::ALL.to_vec(),
            };
            let records: Vec<_> = match migration {
                Some(name) => vec![plan.migration(&name).ok_or_else(|| {
                    MigrateError::Config(format!("migration '{name}' is not in the snapshot"))
                })?],
                None => plan.migrations.iter().collect(),
            };
            for record in records {
                for dialect in &dialects {
                    println!("-- {} ({dialect})", record.name);
                    println!("{}\n", record.instructions.script(*dialect));
                }
            }
        }

        Commands::Crud { table, dialect } => {
            let plan = require_plan(&snapshot)?;
            let config = GeneratorConfig::load(&cli.config)?;
            config.validate(&plan.schema)?;
            let dialects = match dialect {
                Some(dialect) => vec![dialect],
                None => config.dialects.clone(),
            };

            let tables: Vec<_> = match table {
                Some(name) => vec![plan
                    .table(&name)
                    .ok_or(tablewright_core::Error::TableNotFound(name))?],
                None => plan.schema.tables.values().collect(),
            };
            let mut bundles = Vec::new();
            for table in tables {
                if table.primary_key().is_none() {
                    warn!(table = %table.name, "Skipping table without a primary key");
                    continue;
                }
                bundles.push(generate(
                    table,
                    &config.options_for(&table.name),
                    &dialects,
                )?);
            }
            println!("{}", serde_json::to_string_pretty(&bundles)?);
        }

        Commands::Verify { table } => {
            let plan = require_plan(&snapshot)?;
            let expected = plan
                .table(&table)
                .ok_or_else(|| tablewright_core::Error::TableNotFound(table.clone()))?;
            let mut executor = connect(cli.database.as_deref()).await?;
            let dialect = executor.dialect();
            let diff = verify_table(executor.connection(), dialect, expected).await?;
            if diff.is_empty() {
                info!(table = %table, "Table matches the snapshot");
            } else {
                println!("{diff}");
                return Err(MigrateError::Config(format!(
                    "table '{table}' differs from the snapshot"
                )));
            }
        }
    }

    Ok(())
}

async fn connect(database: Option<&str>) -> Result<MigrationExecutor> {
    let url = database.ok_or_else(|| {
        MigrateError::Config("no database URL; pass --database or set DATABASE_URL".to_string())
    })?;
    MigrationExecutor::connect(url).await
}

fn require_plan(snapshot: &Snapshot) -> Result<MigrationPlan> {
    snapshot.load()?.ok_or_else(|| {
        MigrateError::Config(format!(
            "snapshot '{}' does not exist; run `migrate` first",
            snapshot.path().display()
        ))
    })
}

fn print_status(statuses: &[crate::executor::MigrationStatus], plan: &MigrationPlan) {
    println!("\nMigrations:");
    println!("{:-<60}", "");
    for status in statuses {
        let mark = if status.applied { "X" } else { " " };
        match status.applied_at {
            Some(at) => println!(
                " [{mark}] {} ({})",
                status.name,
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!(" [{mark}] {}", status.name),
        }
    }

    let unregistered: Vec<_> = plan
        .migrations
        .iter()
        .filter(|m| !statuses.iter().any(|s| s.name == m.name))
        .collect();
    if !unregistered.is_empty() {
        println!("\nIn the snapshot but not registered:");
        for record in unregistered {
            println!("  {}", record.name);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn parses_global_flags() {
        let cli = Cli::try_parse_from([
            "tablewright",
            "--database",
            "sqlite::memory:",
            "--snapshot",
            "db/schema.json",
            "sql",
            "--dialect",
            "postgres",
        ])
        .unwrap();

        assert_eq!(cli.database.as_deref(), Some("sqlite::memory:"));
        assert_eq!(cli.snapshot, PathBuf::from("db/schema.json"));
        assert!(matches!(
            cli.command,
            Commands::Sql {
                dialect: Some(Dialect::Postgres),
                migration: None
            }
        ));
    }

    #[test]
    fn defaults_paths() {
        let cli = Cli::try_parse_from(["tablewright", "migrate", "--dry-run"]).unwrap();
        assert_eq!(cli.snapshot, PathBuf::from(DEFAULT_SNAPSHOT_PATH));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Commands::Migrate { dry_run: true }));
    }

    #[test]
    fn rejects_unknown_dialect() {
        assert!(Cli::try_parse_from(["tablewright", "crud", "--dialect", "oracle"]).is_err());
    }

    #[tokio::test]
    async fn sql_without_snapshot_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("none.json");
        let cli = Cli::try_parse_from([
            OsStr::new("tablewright"),
            OsStr::new("--snapshot"),
            snapshot.as_os_str(),
            OsStr::new("sql"),
        ])
        .unwrap();
        let err = execute(cli, &[]).await.unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}

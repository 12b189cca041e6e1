//! Migration units and the accumulated plan.
//!
//! A [`Migration`] describes its changes against a [`MigrationContext`]. The
//! context works on a copy of the accumulated schema, generates the SQL for
//! every dialect as each change is made, and records which tables changed.
//! [`MigrationPlan::prepare`] runs a migration without touching the plan;
//! [`MigrationPlan::commit`] folds the result in.
//!
//! # Example
//!
//! ```rust
//! use tablewright_core::schema::{TableBuilder, string};
//! use tablewright_migrate::plan::{Migration, MigrationContext, MigrationPlan, RegisteredMigration};
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
//! let mut plan = MigrationPlan::new();
//! plan.apply(&RegisteredMigration::new::<CreateUsers>()).unwrap();
//! assert!(plan.table("users").is_some());
//! assert!(plan.migrations[0].instructions.sqlite[0].starts_with("CREATE TABLE \"users\""));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tablewright_core::dialect::Dialect;
use tablewright_core::error::Error as CoreError;
use tablewright_core::schema::{AlterTableBuilder, Schema, Table, TableBuilder};

use crate::error::{MigrateError, Result};
use crate::name::MigrationName;

/// A migration unit defined in Rust code.
pub trait Migration {
    /// Unique name, `<14-digit timestamp>_<snake_case_description>`.
    const NAME: &'static str;

    /// Describes the changes made by this migration.
    fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()>;
}

/// A migration with runtime-accessible metadata.
#[derive(Clone, Copy, Debug)]
pub struct RegisteredMigration {
    /// Migration name.
    pub name: &'static str,
    /// Function describing the changes.
    pub up: fn(&mut MigrationContext) -> tablewright_core::Result<()>,
}

impl RegisteredMigration {
    /// Creates a registered migration from a `Migration` implementor.
    #[must_use]
    pub const fn new<M: Migration>() -> Self {
        Self {
            name: M::NAME,
            up: M::up,
        }
    }
}

/// Validates names and sorts `migrations` by ascending version.
///
/// Discovery order does not matter. Two migrations with the same version
/// are rejected, since their relative order would be arbitrary.
pub fn ordered(
    migrations: &[RegisteredMigration],
) -> Result<Vec<(MigrationName, &RegisteredMigration)>> {
    let mut named = migrations
        .iter()
        .map(|m| MigrationName::parse(m.name).map(|name| (name, m)))
        .collect::<Result<Vec<_>>>()?;
    named.sort_by(|a, b| a.0.cmp(&b.0));

    for pair in named.windows(2) {
        if pair[0].0.version() == pair[1].0.version() {
            return Err(MigrateError::DuplicateVersion {
                version: pair[0].0.version(),
                first: pair[0].0.to_string(),
                second: pair[1].0.to_string(),
            });
        }
    }
    Ok(named)
}

/// The SQL of one migration for each dialect, one entry per statement.
///
/// Entries are executed one at a time in order. An entry written by hand
/// through [`MigrationContext::raw_sql`] is kept whole, so it may hold a
/// trigger or function body, or several statements. An empty list means the
/// dialect needs no statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    /// PostgreSQL statements.
    #[serde(default)]
    pub postgres: Vec<String>,
    /// MySQL statements.
    #[serde(default)]
    pub mysql: Vec<String>,
    /// SQLite statements.
    #[serde(default)]
    pub sqlite: Vec<String>,
}

impl Instructions {
    /// The same script for every dialect.
    #[must_use]
    pub fn portable(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self::per_dialect(sql.clone(), sql.clone(), sql)
    }

    /// One script per dialect. A blank script skips that dialect.
    #[must_use]
    pub fn per_dialect(
        postgres: impl Into<String>,
        mysql: impl Into<String>,
        sqlite: impl Into<String>,
    ) -> Self {
        Self {
            postgres: script_entry(postgres.into()),
            mysql: script_entry(mysql.into()),
            sqlite: script_entry(sqlite.into()),
        }
    }

    /// The statements for `dialect`, in execution order.
    #[must_use]
    pub fn get(&self, dialect: Dialect) -> &[String] {
        match dialect {
            Dialect::Postgres => &self.postgres,
            Dialect::MySql => &self.mysql,
            Dialect::Sqlite => &self.sqlite,
        }
    }

    /// The statements for `dialect` as one `;`-terminated script, for
    /// display only.
    #[must_use]
    pub fn script(&self, dialect: Dialect) -> String {
        let statements: Vec<String> = self
            .get(dialect)
            .iter()
            .map(|s| s.trim_end().trim_end_matches(';').to_string())
            .collect();
        Dialect::join(&statements)
    }

    fn from_statements(statements: &BTreeMap<Dialect, Vec<String>>) -> Self {
        let mut instructions = Self::default();
        for (dialect, list) in statements {
            let slot = match dialect {
                Dialect::Postgres => &mut instructions.postgres,
                Dialect::MySql => &mut instructions.mysql,
                Dialect::Sqlite => &mut instructions.sqlite,
            };
            slot.clone_from(list);
        }
        instructions
    }
}

fn script_entry(script: String) -> Vec<String> {
    if script.trim().is_empty() {
        Vec::new()
    } else {
        vec![script]
    }
}

/// The record of a migration in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration name.
    pub name: String,
    /// Generated SQL per dialect.
    pub instructions: Instructions,
}

/// A change to the accumulated table map.
#[derive(Debug, Clone, PartialEq)]
pub enum TableDelta {
    /// The table was created or altered; this is its new definition.
    Put(Table),
    /// The table was dropped.
    Remove(String),
}

/// The working state of one migration while its `up` function runs.
#[derive(Debug)]
pub struct MigrationContext {
    schema: Schema,
    statements: BTreeMap<Dialect, Vec<String>>,
    deltas: Vec<TableDelta>,
}

impl MigrationContext {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            statements: Dialect::ALL.iter().map(|d| (*d, Vec::new())).collect(),
            deltas: Vec::new(),
        }
    }

    /// The schema as changed so far by this migration.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Looks up a table as changed so far by this migration.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.table(name)
    }

    /// Creates a table.
    ///
    /// Fails with [`CoreError::DuplicateTable`] if the table already exists.
    pub fn create_table(&mut self, builder: TableBuilder) -> tablewright_core::Result<()> {
        let table = builder.build(&self.schema)?;
        let generated = synthesize_all(|dialect| dialect.create_table(&table))?;
        self.record(generated, TableDelta::Put(table));
        Ok(())
    }

    /// Alters an existing table.
    ///
    /// `change` receives a builder over the current definition. Operations
    /// are only applied once it returns successfully.
    pub fn alter_table<F>(&mut self, name: &str, change: F) -> tablewright_core::Result<()>
    where
        F: FnOnce(&mut AlterTableBuilder) -> tablewright_core::Result<()>,
    {
        let before = self
            .schema
            .table(name)
            .cloned()
            .ok_or_else(|| CoreError::TableNotFound(name.to_string()))?;

        let mut builder = AlterTableBuilder::new(&before);
        change(&mut builder)?;
        let operations = builder.build()?;
        if operations.is_empty() {
            return Ok(());
        }

        let after = before.apply(&operations)?;
        let generated = synthesize_all(|dialect| dialect.alter_table(name, &operations, &before))?;
        self.record(generated, TableDelta::Put(after));
        Ok(())
    }

    /// Drops an existing table.
    pub fn drop_table(&mut self, name: &str) -> tablewright_core::Result<()> {
        if !self.schema.contains(name) {
            return Err(CoreError::TableNotFound(name.to_string()));
        }
        let generated = synthesize_all(|dialect| Ok(dialect.drop_table(name)))?;
        self.record(generated, TableDelta::Remove(name.to_string()));
        Ok(())
    }

    /// Runs hand-written SQL. The schema is not changed.
    ///
    /// Each script is sent to the database as given, in one round trip.
    pub fn raw_sql(&mut self, instructions: Instructions) {
        for (dialect, list) in &mut self.statements {
            list.extend_from_slice(instructions.get(*dialect));
        }
    }

    fn record(&mut self, generated: Vec<(Dialect, Vec<String>)>, delta: TableDelta) {
        for (dialect, sql) in generated {
            self.statements.entry(dialect).or_default().extend(sql);
        }
        apply_delta(&mut self.schema, delta.clone());
        self.deltas.push(delta);
    }
}

/// Generates the statements for every dialect before anything is recorded,
/// so a dialect that rejects the change leaves the context untouched.
fn synthesize_all<F>(synthesize: F) -> tablewright_core::Result<Vec<(Dialect, Vec<String>)>>
where
    F: Fn(Dialect) -> tablewright_core::Result<Vec<String>>,
{
    Dialect::ALL
        .iter()
        .map(|dialect| synthesize(*dialect).map(|sql| (*dialect, sql)))
        .collect()
}

fn apply_delta(schema: &mut Schema, delta: TableDelta) {
    match delta {
        TableDelta::Put(table) => schema.insert(table),
        TableDelta::Remove(name) => {
            schema.remove(&name);
        }
    }
}

/// A migration whose SQL has been generated but which is not yet part of
/// the plan.
#[derive(Debug, Clone)]
pub struct PreparedMigration {
    name: MigrationName,
    statements: BTreeMap<Dialect, Vec<String>>,
    deltas: Vec<TableDelta>,
}

impl PreparedMigration {
    /// The migration name.
    #[must_use]
    pub fn name(&self) -> &MigrationName {
        &self.name
    }

    /// Statements for `dialect`, in execution order.
    #[must_use]
    pub fn statements(&self, dialect: Dialect) -> &[String] {
        self.statements.get(&dialect).map_or(&[], Vec::as_slice)
    }

    /// Table changes made by the migration.
    #[must_use]
    pub fn deltas(&self) -> &[TableDelta] {
        &self.deltas
    }

    /// The record stored in the plan once committed.
    #[must_use]
    pub fn record(&self) -> MigrationRecord {
        MigrationRecord {
            name: self.name.to_string(),
            instructions: Instructions::from_statements(&self.statements),
        }
    }
}

/// The accumulated schema and the migrations that produced it.
///
/// This is the unit persisted as the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Tables after every recorded migration.
    pub schema: Schema,
    /// Recorded migrations in the order they were committed.
    pub migrations: Vec<MigrationRecord>,
}

impl MigrationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a migration with this name is recorded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.migrations.iter().any(|m| m.name == name)
    }

    /// Looks up a recorded migration.
    #[must_use]
    pub fn migration(&self, name: &str) -> Option<&MigrationRecord> {
        self.migrations.iter().find(|m| m.name == name)
    }

    /// Looks up a table in the accumulated schema.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.table(name)
    }

    /// Registered migrations not yet recorded in this plan, in ascending
    /// version order.
    pub fn pending<'a>(
        &self,
        migrations: &'a [RegisteredMigration],
    ) -> Result<Vec<&'a RegisteredMigration>> {
        Ok(ordered(migrations)?
            .into_iter()
            .filter(|(name, _)| !self.contains(name.as_str()))
            .map(|(_, m)| m)
            .collect())
    }

    /// Runs `migration` against a copy of the accumulated schema.
    ///
    /// The plan is not changed. All structural errors surface here.
    pub fn prepare(&self, migration: &RegisteredMigration) -> Result<PreparedMigration> {
        let name = MigrationName::parse(migration.name)?;
        if self.contains(name.as_str()) {
            return Err(CoreError::Validation(format!(
                "migration '{name}' is already recorded"
            ))
            .into());
        }

        let mut ctx = MigrationContext::new(self.schema.clone());
        (migration.up)(&mut ctx)?;
        Ok(PreparedMigration {
            name,
            statements: ctx.statements,
            deltas: ctx.deltas,
        })
    }

    /// Folds a prepared migration into the plan.
    pub fn commit(&mut self, prepared: PreparedMigration) {
        let record = prepared.record();
        for delta in prepared.deltas {
            apply_delta(&mut self.schema, delta);
        }
        self.migrations.push(record);
    }

    /// Prepares and commits a migration.
    pub fn apply(&mut self, migration: &RegisteredMigration) -> Result<()> {
        let prepared = self.prepare(migration)?;
        self.commit(prepared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablewright_core::schema::{integer, json, string, text};

    struct CreateA;
    impl Migration for CreateA {
        const NAME: &'static str = "20240101000000_create_a";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.create_table(
                TableBuilder::new("a").column(integer("id").primary_key().auto_increment()),
            )
        }
    }

    struct AddB;
    impl Migration for AddB {
        const NAME: &'static str = "20240102000000_add_b";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.alter_table("a", |t| {
                t.add_column(text("b"))?;
                Ok(())
            })
        }
    }

    struct DropA;
    impl Migration for DropA {
        const NAME: &'static str = "20240103000000_drop_a";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.drop_table("a")
        }
    }

    struct CreateADuplicate;
    impl Migration for CreateADuplicate {
        const NAME: &'static str = "20240104000000_create_a_again";
        fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
            ctx.create_table(TableBuilder::new("a").column(integer("id").primary_key()))
        }
    }

    #[test]
    fn create_then_alter_accumulates() {
        let mut plan = MigrationPlan::new();
        plan.apply(&RegisteredMigration::new::<CreateA>()).unwrap();
        plan.apply(&RegisteredMigration::new::<AddB>()).unwrap();

        let a = plan.table("a").unwrap();
        assert_eq!(a.column_names().collect::<Vec<_>>(), vec!["id", "b"]);
        let names: Vec<_> = plan.migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![CreateA::NAME, AddB::NAME]);
        assert_eq!(
            plan.migrations[1].instructions.postgres,
            ["ALTER TABLE \"a\" ADD COLUMN \"b\" TEXT"]
        );
    }

    #[test]
    fn prepare_leaves_plan_untouched() {
        let mut plan = MigrationPlan::new();
        plan.apply(&RegisteredMigration::new::<CreateA>()).unwrap();
        let before = plan.clone();

        let prepared = plan.prepare(&RegisteredMigration::new::<DropA>()).unwrap();
        assert_eq!(plan, before);
        assert_eq!(prepared.statements(Dialect::MySql), ["DROP TABLE `a`"]);

        plan.commit(prepared);
        assert!(plan.table("a").is_none());
    }

    #[test]
    fn structural_errors_surface_in_prepare() {
        let mut plan = MigrationPlan::new();
        let err = plan.prepare(&RegisteredMigration::new::<AddB>()).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Core(CoreError::TableNotFound(ref t)) if t == "a"
        ));

        plan.apply(&RegisteredMigration::new::<CreateA>()).unwrap();
        let err = plan
            .prepare(&RegisteredMigration::new::<CreateADuplicate>())
            .unwrap_err();
        assert!(matches!(err, MigrateError::Core(CoreError::DuplicateTable(_))));
    }

    #[test]
    fn dialect_rejection_records_nothing() {
        struct JsonUnique;
        impl Migration for JsonUnique {
            const NAME: &'static str = "20240105000000_json_unique";
            fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
                ctx.create_table(
                    TableBuilder::new("docs")
                        .column(integer("id").primary_key())
                        .column(json("body").not_null())
                        .unique_index(&["body"]),
                )
            }
        }

        let plan = MigrationPlan::new();
        let err = plan
            .prepare(&RegisteredMigration::new::<JsonUnique>())
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Core(CoreError::UnsupportedOperation {
                dialect: Dialect::MySql,
                ..
            })
        ));
    }

    #[test]
    fn pending_sorts_and_skips_recorded() {
        let registered = [
            RegisteredMigration::new::<DropA>(),
            RegisteredMigration::new::<CreateA>(),
            RegisteredMigration::new::<AddB>(),
        ];
        let mut plan = MigrationPlan::new();
        plan.apply(&RegisteredMigration::new::<CreateA>()).unwrap();

        let pending: Vec<_> = plan
            .pending(&registered)
            .unwrap()
            .iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(pending, vec![AddB::NAME, DropA::NAME]);
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        struct Twin;
        impl Migration for Twin {
            const NAME: &'static str = "20240101000000_twin";
            fn up(_ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
                Ok(())
            }
        }
        let err = ordered(&[
            RegisteredMigration::new::<CreateA>(),
            RegisteredMigration::new::<Twin>(),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::DuplicateVersion {
                version: 20_240_101_000_000,
                ..
            }
        ));
    }

    #[test]
    fn raw_sql_is_kept_per_dialect() {
        struct Seed;
        impl Migration for Seed {
            const NAME: &'static str = "20240106000000_seed";
            fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
                ctx.create_table(
                    TableBuilder::new("tags")
                        .column(integer("id").primary_key())
                        .column(string("label").not_null()),
                )?;
                ctx.raw_sql(Instructions::per_dialect(
                    "INSERT INTO tags (id, label) VALUES (1, 'a');",
                    "  ",
                    "INSERT INTO tags (id, label) VALUES (1, 'a')",
                ));
                Ok(())
            }
        }

        let prepared = MigrationPlan::new()
            .prepare(&RegisteredMigration::new::<Seed>())
            .unwrap();
        assert_eq!(prepared.statements(Dialect::MySql).len(), 1);
        assert_eq!(
            prepared.statements(Dialect::Postgres)[1],
            "INSERT INTO tags (id, label) VALUES (1, 'a');"
        );
        assert_eq!(prepared.deltas().len(), 1);
    }

    #[test]
    fn raw_scripts_are_never_split() {
        const BODY: &str =
            "CREATE TRIGGER a_ins AFTER INSERT ON a BEGIN\n  INSERT INTO log VALUES (NEW.id);\nEND;";
        struct Trigger;
        impl Migration for Trigger {
            const NAME: &'static str = "20240107000000_trigger";
            fn up(ctx: &mut MigrationContext) -> tablewright_core::Result<()> {
                ctx.raw_sql(Instructions::portable(BODY));
                Ok(())
            }
        }

        let mut plan = MigrationPlan::new();
        plan.apply(&RegisteredMigration::new::<Trigger>()).unwrap();
        for dialect in Dialect::ALL {
            assert_eq!(plan.migrations[0].instructions.get(dialect), [BODY]);
        }
    }

    #[test]
    fn script_terminates_each_statement_once() {
        let instructions = Instructions {
            postgres: vec!["SELECT 1".into(), "SELECT 2;".into()],
            ..Instructions::default()
        };
        assert_eq!(
            instructions.script(Dialect::Postgres),
            "SELECT 1;\nSELECT 2;"
        );
        assert_eq!(instructions.script(Dialect::MySql), "");
    }
}

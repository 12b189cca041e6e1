//! SQLite DDL.
//!
//! SQLite's ALTER TABLE only adds, renames and (in simple cases) drops
//! columns. Anything else is done by rebuilding the table: create a copy
//! with the final shape, copy the rows across, drop the original and
//! rename the copy into place.

use super::{Dialect, generic_create_index, replay};
use crate::error::Result;
use crate::schema::{Column, ColumnType, DefaultValue, Operation, Table};

const LITE: Dialect = Dialect::Sqlite;

/// Prefix of the temporary table used while rebuilding.
const REBUILD_PREFIX: &str = "__tablewright_new_";

pub(super) const fn type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer | ColumnType::BigInt => "INTEGER",
        ColumnType::String | ColumnType::Text => "TEXT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Float => "REAL",
        ColumnType::Decimal => "NUMERIC",
        ColumnType::DateTime => "DATETIME",
        ColumnType::Binary => "BLOB",
        ColumnType::Json => "JSON",
    }
}

pub(super) fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::CurrentTimestamp => format!("({})", LITE.now()),
        DefaultValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
        DefaultValue::Expression(expr) => format!("({expr})"),
        _ => default.to_sql(),
    }
}

fn column_definition(col: &Column) -> String {
    let mut sql = format!(
        "{} {}",
        LITE.quote_identifier(&col.name),
        type_name(col.column_type)
    );

    if col.primary_key {
        sql.push_str(" PRIMARY KEY");
        if col.auto_increment {
            sql.push_str(" AUTOINCREMENT");
        }
    }
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.unique && !col.primary_key {
        sql.push_str(" UNIQUE");
    }
    if let Some(ref default) = col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&render_default(default));
    }
    sql
}

fn create_table_statement(name: &str, columns: &[Column]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("    {}", column_definition(c)))
        .collect();
    format!(
        "CREATE TABLE {} (\n{}\n)",
        LITE.quote_identifier(name),
        defs.join(",\n")
    )
}

pub(super) fn create_table(table: &Table) -> Vec<String> {
    let mut statements = vec![create_table_statement(&table.name, &table.columns)];
    statements.extend(
        table
            .indexes
            .iter()
            .map(|index| generic_create_index(LITE, &table.name, index)),
    );
    statements
}

/// Returns `true` if ALTER TABLE cannot express `operation` on `current`.
fn needs_rebuild(operation: &Operation, current: &Table) -> bool {
    match operation {
        Operation::ChangeType { .. }
        | Operation::ChangeNullable { .. }
        | Operation::ChangeDefault { .. } => true,
        // ADD COLUMN takes neither UNIQUE nor a non-constant default
        Operation::AddColumn(col) => {
            col.unique
                || matches!(
                    col.default,
                    Some(DefaultValue::CurrentTimestamp | DefaultValue::Expression(_))
                )
        }
        // DROP COLUMN refuses keys and indexed columns
        Operation::DropColumn { column } => {
            current
                .column(column)
                .is_some_and(|c| c.primary_key || c.unique)
                || current
                    .indexes
                    .iter()
                    .any(|i| i.columns.iter().any(|c| c == column))
        }
        Operation::RenameColumn { .. }
        | Operation::AddIndex(_)
        | Operation::DropIndex { .. }
        | Operation::RenameIndex { .. } => false,
    }
}

pub(super) fn alter_table(operations: &[Operation], before: &Table) -> Result<Vec<String>> {
    let mut rebuild = false;
    replay(before, operations, |operation, current| {
        rebuild |= needs_rebuild(operation, current);
        Ok(())
    })?;

    if rebuild {
        rebuild_table(operations, before)
    } else {
        direct_alter(operations, before)
    }
}

fn direct_alter(operations: &[Operation], before: &Table) -> Result<Vec<String>> {
    let table = LITE.quote_identifier(&before.name);
    let mut statements = Vec::new();

    replay(before, operations, |operation, current| {
        match operation {
            Operation::AddColumn(col) => statements.push(format!(
                "ALTER TABLE {table} ADD COLUMN {}",
                column_definition(col)
            )),
            Operation::DropColumn { column } => statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                LITE.quote_identifier(column)
            )),
            Operation::RenameColumn { old_name, new_name } => statements.push(format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                LITE.quote_identifier(old_name),
                LITE.quote_identifier(new_name)
            )),
            Operation::AddIndex(index) => {
                statements.push(generic_create_index(LITE, &before.name, index));
            }
            Operation::DropIndex { name } => {
                statements.push(format!("DROP INDEX {}", LITE.quote_identifier(name)));
            }
            Operation::RenameIndex { old_name, new_name } => {
                // no RENAME INDEX; recreate under the new name
                let after = current.apply(std::slice::from_ref(operation))?;
                statements.push(format!("DROP INDEX {}", LITE.quote_identifier(old_name)));
                if let Some(index) = after.index(new_name) {
                    statements.push(generic_create_index(LITE, &before.name, index));
                }
            }
            Operation::ChangeType { .. }
            | Operation::ChangeNullable { .. }
            | Operation::ChangeDefault { .. } => {}
        }
        Ok(())
    })?;

    Ok(statements)
}

/// Tracks where each column of the rebuilt table comes from.
struct Lineage<'a> {
    /// `(current name, source column in the before table)`.
    columns: Vec<(String, Option<&'a Column>)>,
}

impl<'a> Lineage<'a> {
    fn new(before: &'a Table) -> Self {
        Self {
            columns: before
                .columns
                .iter()
                .map(|c| (c.name.clone(), Some(c)))
                .collect(),
        }
    }

    fn follow(&mut self, operation: &Operation) {
        match operation {
            Operation::AddColumn(col) => self.columns.push((col.name.clone(), None)),
            Operation::DropColumn { column } => self.columns.retain(|(name, _)| name != column),
            Operation::RenameColumn { old_name, new_name } => {
                for (name, _) in &mut self.columns {
                    if name == old_name {
                        name.clone_from(new_name);
                    }
                }
            }
            _ => {}
        }
    }

    fn source(&self, name: &str) -> Option<&'a Column> {
        self.columns
            .iter()
            .find(|(current, _)| current == name)
            .and_then(|(_, source)| *source)
    }
}

/// Expression copying `source` into `target` during a rebuild.
fn copy_expression(source: &Column, target: &Column) -> String {
    let mut expr = LITE.quote_identifier(&source.name);
    if type_name(source.column_type) != type_name(target.column_type) {
        expr = format!("CAST({expr} AS {})", type_name(target.column_type));
    }
    if source.nullable && !target.nullable {
        if let Some(ref default) = target.default {
            expr = format!("COALESCE({expr}, {})", render_default(default));
        }
    }
    expr
}

fn rebuild_table(operations: &[Operation], before: &Table) -> Result<Vec<String>> {
    let mut lineage = Lineage::new(before);
    let after = replay(before, operations, |operation, _current| {
        lineage.follow(operation);
        Ok(())
    })?;

    let temp = format!("{REBUILD_PREFIX}{}", before.name);
    let mut statements = vec![create_table_statement(&temp, &after.columns)];

    let mut targets = Vec::new();
    let mut sources = Vec::new();
    for col in &after.columns {
        if let Some(source) = lineage.source(&col.name) {
            targets.push(LITE.quote_identifier(&col.name));
            sources.push(copy_expression(source, col));
        }
    }
    if !targets.is_empty() {
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            LITE.quote_identifier(&temp),
            targets.join(", "),
            sources.join(", "),
            LITE.quote_identifier(&before.name)
        ));
    }

    statements.push(format!("DROP TABLE {}", LITE.quote_identifier(&before.name)));
    statements.push(format!(
        "ALTER TABLE {} RENAME TO {}",
        LITE.quote_identifier(&temp),
        LITE.quote_identifier(&after.name)
    ));
    statements.extend(
        after
            .indexes
            .iter()
            .map(|index| generic_create_index(LITE, &after.name, index)),
    );
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AlterTableBuilder, Schema, TableBuilder, datetime, integer, string, text};

    fn users() -> Table {
        TableBuilder::with_audit_columns("users")
            .column(string("name").not_null())
            .column(text("bio"))
            .build(&Schema::default())
            .unwrap()
    }

    #[test]
    fn create_table_with_autoincrement() {
        let statements = LITE.create_table(&users()).unwrap();
        assert!(statements[0].contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"));
        assert!(statements[0].contains("\"public_id\" TEXT NOT NULL UNIQUE"));
        assert_eq!(
            statements[1],
            "CREATE INDEX \"idx_users_created_at\" ON \"users\" (\"created_at\", \"id\")"
        );
    }

    #[test]
    fn simple_changes_use_alter_table() {
        let table = users();
        let mut alter = AlterTableBuilder::new(&table);
        alter.add_column(integer("age")).unwrap();
        let bio = alter.column("bio").unwrap();
        alter.rename_column(bio, "about").unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("users", &ops, &table).unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"age\" INTEGER",
                "ALTER TABLE \"users\" RENAME COLUMN \"bio\" TO \"about\"",
            ]
        );
    }

    #[test]
    fn rename_index_recreates_it() {
        let table = users();
        let mut alter = AlterTableBuilder::new(&table);
        alter
            .rename_index("idx_users_created_at", "users_by_created")
            .unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("users", &ops, &table).unwrap();
        assert_eq!(
            statements,
            vec![
                "DROP INDEX \"idx_users_created_at\"",
                "CREATE INDEX \"users_by_created\" ON \"users\" (\"created_at\", \"id\")",
            ]
        );
    }

    #[test]
    fn change_type_rebuilds_table() {
        let table = TableBuilder::new("notes")
            .column(integer("id").primary_key().auto_increment())
            .column(text("body"))
            .column(integer("rank"))
            .index(&["rank"])
            .build(&Schema::default())
            .unwrap();
        let mut alter = AlterTableBuilder::new(&table);
        let body = alter.column("body").unwrap();
        let content = alter.rename_column(body, "content").unwrap();
        let rank = alter.column("rank").unwrap();
        alter.change_type(&rank, ColumnType::Float).unwrap();
        alter.change_nullable(&content, false).unwrap();
        alter
            .change_default(&content, Some(DefaultValue::String(String::new())))
            .unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("notes", &ops, &table).unwrap();
        assert_eq!(statements.len(), 5);
        assert!(statements[0].starts_with("CREATE TABLE \"__tablewright_new_notes\""));
        assert!(statements[0].contains("\"content\" TEXT NOT NULL DEFAULT ''"));
        assert!(statements[0].contains("\"rank\" REAL"));
        assert_eq!(
            statements[1],
            "INSERT INTO \"__tablewright_new_notes\" (\"id\", \"content\", \"rank\") \
             SELECT \"id\", COALESCE(\"body\", ''), CAST(\"rank\" AS REAL) FROM \"notes\""
        );
        assert_eq!(statements[2], "DROP TABLE \"notes\"");
        assert_eq!(
            statements[3],
            "ALTER TABLE \"__tablewright_new_notes\" RENAME TO \"notes\""
        );
        assert_eq!(
            statements[4],
            "CREATE INDEX \"idx_notes_rank\" ON \"notes\" (\"rank\")"
        );
        // the before table is left alone
        assert!(table.has_column("body"));
    }

    #[test]
    fn dropping_indexed_column_rebuilds() {
        let table = users();
        let mut alter = AlterTableBuilder::new(&table);
        let created = alter.column("created_at").unwrap();
        alter.drop_column(created).unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("users", &ops, &table).unwrap();
        assert!(statements[0].starts_with("CREATE TABLE \"__tablewright_new_users\""));
        assert!(!statements[1].contains("\"created_at\""));
        // the index went with the column
        assert_eq!(statements.len(), 4);
    }

    #[test]
    fn dropping_plain_column_is_direct() {
        let table = users();
        let mut alter = AlterTableBuilder::new(&table);
        let bio = alter.column("bio").unwrap();
        alter.drop_column(bio).unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("users", &ops, &table).unwrap();
        assert_eq!(statements, vec!["ALTER TABLE \"users\" DROP COLUMN \"bio\""]);
    }

    #[test]
    fn timestamp_default_column_rebuilds() {
        let table = users();
        let mut alter = AlterTableBuilder::new(&table);
        alter
            .add_column(datetime("seen_at").not_null().default_now())
            .unwrap();
        let ops = alter.build().unwrap();

        let statements = LITE.alter_table("users", &ops, &table).unwrap();
        assert!(statements[0].contains("\"seen_at\" DATETIME NOT NULL DEFAULT (datetime('now'))"));
        assert!(!statements[1].contains("seen_at"));
    }
}

//! PostgreSQL DDL.

use super::{Dialect, generic_create_index, replay};
use crate::error::Result;
use crate::schema::{Column, ColumnType, DefaultValue, Operation, Table};

const PG: Dialect = Dialect::Postgres;

pub(super) const fn type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::BigInt => "BIGINT",
        ColumnType::String => "VARCHAR(255)",
        ColumnType::Text => "TEXT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::Decimal => "NUMERIC",
        ColumnType::DateTime => "TIMESTAMPTZ",
        ColumnType::Binary => "BYTEA",
        ColumnType::Json => "JSONB",
    }
}

pub(super) fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::CurrentTimestamp => PG.now().to_string(),
        _ => default.to_sql(),
    }
}

fn column_definition(col: &Column) -> String {
    // serial types carry their own sequence default
    let data_type = if col.auto_increment && col.primary_key {
        match col.column_type {
            ColumnType::BigInt => "BIGSERIAL",
            _ => "SERIAL",
        }
    } else {
        type_name(col.column_type)
    };

    let mut sql = format!("{} {}", PG.quote_identifier(&col.name), data_type);

    if col.primary_key {
        sql.push_str(" PRIMARY KEY");
    } else {
        if !col.nullable {
            sql.push_str(" NOT NULL");
        }
        if col.unique {
            sql.push_str(" UNIQUE");
        }
    }

    if let Some(ref default) = col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&render_default(default));
    }

    sql
}

pub(super) fn create_table(table: &Table) -> Vec<String> {
    let mut sql = String::from("CREATE TABLE ");
    sql.push_str(&PG.quote_identifier(&table.name));
    sql.push_str(" (\n");
    let column_defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("    {}", column_definition(c)))
        .collect();
    sql.push_str(&column_defs.join(",\n"));
    sql.push_str("\n)");

    let mut statements = vec![sql];
    statements.extend(
        table
            .indexes
            .iter()
            .map(|index| generic_create_index(PG, &table.name, index)),
    );
    statements
}

pub(super) fn alter_table(operations: &[Operation], before: &Table) -> Result<Vec<String>> {
    let table = PG.quote_identifier(&before.name);
    let mut statements = Vec::new();

    replay(before, operations, |operation, _current| {
        let sql = match operation {
            Operation::AddColumn(col) => {
                format!("ALTER TABLE {table} ADD COLUMN {}", column_definition(col))
            }
            Operation::DropColumn { column } => format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                PG.quote_identifier(column)
            ),
            Operation::RenameColumn { old_name, new_name } => format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                PG.quote_identifier(old_name),
                PG.quote_identifier(new_name)
            ),
            Operation::AddIndex(index) => generic_create_index(PG, &before.name, index),
            Operation::DropIndex { name } => {
                format!("DROP INDEX {}", PG.quote_identifier(name))
            }
            Operation::RenameIndex { old_name, new_name } => format!(
                "ALTER INDEX {} RENAME TO {}",
                PG.quote_identifier(old_name),
                PG.quote_identifier(new_name)
            ),
            Operation::ChangeType {
                column,
                column_type,
            } => {
                let col = PG.quote_identifier(column);
                let ty = type_name(*column_type);
                format!("ALTER TABLE {table} ALTER COLUMN {col} TYPE {ty} USING {col}::{ty}")
            }
            Operation::ChangeNullable { column, nullable } => {
                let action = if *nullable {
                    "DROP NOT NULL"
                } else {
                    "SET NOT NULL"
                };
                format!(
                    "ALTER TABLE {table} ALTER COLUMN {} {action}",
                    PG.quote_identifier(column)
                )
            }
            Operation::ChangeDefault { column, default } => match default {
                Some(value) => format!(
                    "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT {}",
                    PG.quote_identifier(column),
                    render_default(value)
                ),
                None => format!(
                    "ALTER TABLE {table} ALTER COLUMN {} DROP DEFAULT",
                    PG.quote_identifier(column)
                ),
            },
        };
        statements.push(sql);
        Ok(())
    })?;

    Ok(statements)
}

//! MySQL DDL.
//!
//! MySQL cannot index TEXT or BLOB columns without a key prefix, so those
//! columns are indexed on their first [`KEY_PREFIX`] bytes and a unique
//! TEXT column becomes a table-level UNIQUE KEY. JSON columns cannot be
//! indexed at all.

use super::{Dialect, replay};
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType, DefaultValue, Index, Operation, Table};

const MY: Dialect = Dialect::MySql;

/// Prefix length used when indexing TEXT and BLOB columns.
const KEY_PREFIX: usize = 255;

pub(super) const fn type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INT",
        ColumnType::BigInt => "BIGINT",
        ColumnType::String => "VARCHAR(255)",
        ColumnType::Text => "TEXT",
        ColumnType::Boolean => "TINYINT(1)",
        ColumnType::Float => "DOUBLE",
        ColumnType::Decimal => "DECIMAL(38,10)",
        ColumnType::DateTime => "DATETIME",
        ColumnType::Binary => "LONGBLOB",
        ColumnType::Json => "JSON",
    }
}

/// TEXT, BLOB and JSON columns only take expression defaults, which must be
/// parenthesized.
pub(super) fn render_default(default: &DefaultValue, column_type: ColumnType) -> String {
    match default {
        DefaultValue::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        DefaultValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
        DefaultValue::Null | DefaultValue::Expression(_) => default.to_sql(),
        _ if needs_prefix(column_type) || column_type == ColumnType::Json => {
            format!("({})", default.to_sql())
        }
        _ => default.to_sql(),
    }
}

const fn needs_prefix(column_type: ColumnType) -> bool {
    matches!(column_type, ColumnType::Text | ColumnType::Binary)
}

/// Where a column definition is used.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    /// CREATE TABLE or ADD COLUMN: key constraints are rendered.
    Declare,
    /// MODIFY COLUMN: keys already exist and must not be repeated.
    Modify,
}

fn column_definition(col: &Column, context: Context) -> String {
    let mut sql = format!(
        "{} {}",
        MY.quote_identifier(&col.name),
        type_name(col.column_type)
    );

    if !col.nullable || col.primary_key {
        sql.push_str(" NOT NULL");
    }
    if col.auto_increment && col.primary_key {
        sql.push_str(" AUTO_INCREMENT");
    }
    if context == Context::Declare {
        if col.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if col.unique && !needs_prefix(col.column_type) {
            sql.push_str(" UNIQUE");
        }
    }
    if let Some(ref default) = col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&render_default(default, col.column_type));
    }
    sql
}

fn key_part(table: &Table, column: &str) -> Result<String> {
    let col = table
        .column(column)
        .ok_or_else(|| Error::column_not_found(&table.name, column))?;
    let quoted = MY.quote_identifier(column);
    match col.column_type {
        ColumnType::Json => Err(Error::UnsupportedOperation {
            dialect: MY,
            operation: format!("index on JSON column {}.{column}", table.name),
        }),
        ty if needs_prefix(ty) => Ok(format!("{quoted}({KEY_PREFIX})")),
        _ => Ok(quoted),
    }
}

fn key_parts(table: &Table, columns: &[String]) -> Result<String> {
    let parts = columns
        .iter()
        .map(|c| key_part(table, c))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// The table-level key standing in for a unique TEXT/BLOB column, or a
/// rejection for a unique JSON column.
fn unique_key(table: &Table, col: &Column) -> Result<Option<String>> {
    if !col.unique || col.primary_key {
        return Ok(None);
    }
    match col.column_type {
        ColumnType::Json => Err(Error::UnsupportedOperation {
            dialect: MY,
            operation: format!("unique JSON column {}.{}", table.name, col.name),
        }),
        ty if needs_prefix(ty) => Ok(Some(format!(
            "UNIQUE KEY {} ({})",
            MY.quote_identifier(&format!("uq_{}_{}", table.name, col.name)),
            key_part(table, &col.name)?
        ))),
        _ => Ok(None),
    }
}

pub(super) fn create_index(table: &Table, index: &Index) -> Result<String> {
    let unique = if index.unique { "UNIQUE " } else { "" };
    Ok(format!(
        "CREATE {unique}INDEX {} ON {} ({})",
        MY.quote_identifier(&index.name),
        MY.quote_identifier(&table.name),
        key_parts(table, &index.columns)?
    ))
}

pub(super) fn create_table(table: &Table) -> Result<Vec<String>> {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("    {}", column_definition(c, Context::Declare)))
        .collect();
    for col in &table.columns {
        if let Some(key) = unique_key(table, col)? {
            defs.push(format!("    {key}"));
        }
    }

    let mut statements = vec![format!(
        "CREATE TABLE {} (\n{}\n)",
        MY.quote_identifier(&table.name),
        defs.join(",\n")
    )];
    for index in &table.indexes {
        statements.push(create_index(table, index)?);
    }
    Ok(statements)
}

/// MODIFY restates the whole column, so it is rendered as it will be.
fn modify_column(current: &Table, operation: &Operation, column: &str) -> Result<String> {
    let after = current.apply(std::slice::from_ref(operation))?;
    let col = after
        .column(column)
        .ok_or_else(|| Error::column_not_found(&after.name, column))?;
    Ok(format!(
        "ALTER TABLE {} MODIFY COLUMN {}",
        MY.quote_identifier(&current.name),
        column_definition(col, Context::Modify)
    ))
}

/// Keys on a column were declared for its current type. TEXT and BLOB need
/// a key prefix the existing keys lack, and JSON cannot be keyed at all.
fn check_keyed_type_change(table: &Table, column: &str, to: ColumnType) -> Result<()> {
    let col = table
        .column(column)
        .ok_or_else(|| Error::column_not_found(&table.name, column))?;
    let keyed = col.unique
        || table
            .indexes
            .iter()
            .any(|index| index.columns.iter().any(|c| c == column));
    let loses_key = to == ColumnType::Json || (needs_prefix(to) && !needs_prefix(col.column_type));
    if keyed && loses_key {
        return Err(Error::UnsupportedOperation {
            dialect: MY,
            operation: format!(
                "changing keyed column {}.{column} from {} to {to}",
                table.name, col.column_type
            ),
        });
    }
    Ok(())
}

pub(super) fn alter_table(operations: &[Operation], before: &Table) -> Result<Vec<String>> {
    let table = MY.quote_identifier(&before.name);
    let mut statements = Vec::new();

    replay(before, operations, |operation, current| {
        match operation {
            Operation::AddColumn(col) => {
                statements.push(format!(
                    "ALTER TABLE {table} ADD COLUMN {}",
                    column_definition(col, Context::Declare)
                ));
                let after = current.apply(std::slice::from_ref(operation))?;
                if let Some(key) = unique_key(&after, col)? {
                    statements.push(format!("ALTER TABLE {table} ADD {key}"));
                }
            }
            Operation::DropColumn { column } => statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                MY.quote_identifier(column)
            )),
            Operation::RenameColumn { old_name, new_name } => statements.push(format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                MY.quote_identifier(old_name),
                MY.quote_identifier(new_name)
            )),
            Operation::AddIndex(index) => statements.push(create_index(current, index)?),
            Operation::DropIndex { name } => statements.push(format!(
                "DROP INDEX {} ON {table}",
                MY.quote_identifier(name)
            )),
            Operation::RenameIndex { old_name, new_name } => statements.push(format!(
                "ALTER TABLE {table} RENAME INDEX {} TO {}",
                MY.quote_identifier(old_name),
                MY.quote_identifier(new_name)
            )),
            Operation::ChangeType { column, column_type } => {
                check_keyed_type_change(current, column, *column_type)?;
                statements.push(modify_column(current, operation, column)?);
            }
            Operation::ChangeNullable { column, .. } => {
                statements.push(modify_column(current, operation, column)?);
            }
            Operation::ChangeDefault { column, default } => {
                let col = current
                    .column(column)
                    .ok_or_else(|| Error::column_not_found(&current.name, column))?;
                let quoted = MY.quote_identifier(column);
                statements.push(match default {
                    Some(value) => format!(
                        "ALTER TABLE {table} ALTER COLUMN {quoted} SET DEFAULT {}",
                        render_default(value, col.column_type)
                    ),
                    None => format!("ALTER TABLE {table} ALTER COLUMN {quoted} DROP DEFAULT"),
                });
            }
        }
        Ok(())
    })?;

    Ok(statements)
}

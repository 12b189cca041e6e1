//! Live database introspection.
//!
//! Reads a table's columns and indexes from the catalog and projects them
//! into a [`NormalizedTable`], ready to be compared with the table the
//! snapshot expects.

use std::collections::BTreeMap;

use sqlx::AnyConnection;
use tablewright_core::dialect::Dialect;
use tablewright_core::error::Error as CoreError;
use tablewright_core::normalize::{
    MySqlColumnInfo, NormalizedIndex, NormalizedTable, PostgresColumnInfo, SqliteColumnInfo,
    TableDiff, diff_tables,
};
use tablewright_core::schema::Table;

use crate::error::Result;

const POSTGRES_COLUMNS: &str = "\
SELECT c.column_name::text, c.data_type::text, c.is_nullable::text, c.column_default::text, \
       c.is_identity::text, \
       EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
               JOIN information_schema.key_column_usage kcu \
                 ON tc.constraint_name = kcu.constraint_name \
                AND tc.table_schema = kcu.table_schema \
                AND tc.table_name = kcu.table_name \
               WHERE tc.constraint_type = 'PRIMARY KEY' \
                 AND tc.table_schema = c.table_schema \
                 AND tc.table_name = c.table_name \
                 AND kcu.column_name = c.column_name) \
FROM information_schema.columns c \
WHERE c.table_schema = current_schema() AND c.table_name = $1 \
ORDER BY c.ordinal_position";

const POSTGRES_INDEXES: &str = "\
SELECT ic.relname::text, a.attname::text, CAST(ix.indisunique AS int)::bigint \
FROM pg_class t \
JOIN pg_namespace n ON n.oid = t.relnamespace \
JOIN pg_index ix ON ix.indrelid = t.oid \
JOIN pg_class ic ON ic.oid = ix.indexrelid \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
WHERE n.nspname = current_schema() AND t.relname = $1 AND NOT ix.indisprimary \
ORDER BY 1, 2";

const MYSQL_COLUMNS: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), \
       CAST(COLUMN_DEFAULT AS CHAR), CAST(COLUMN_KEY AS CHAR), CAST(EXTRA AS CHAR) \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const MYSQL_INDEXES: &str = "\
SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), CAST(NON_UNIQUE = 0 AS SIGNED) \
FROM information_schema.STATISTICS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY' \
ORDER BY INDEX_NAME, SEQ_IN_INDEX";

const SQLITE_COLUMNS: &str = "\
SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid";

const SQLITE_INDEXES: &str = "\
SELECT il.name, ii.name, il.\"unique\" \
FROM pragma_index_list(?) il JOIN pragma_index_info(il.name) ii \
WHERE il.origin <> 'pk' \
ORDER BY il.name, ii.seqno";

/// Reads `table` from the live database.
///
/// Fails with [`CoreError::TableNotFound`] if the table does not exist.
pub async fn introspect_table(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &str,
) -> Result<NormalizedTable> {
    let columns = match dialect {
        Dialect::Postgres => {
            let rows: Vec<(String, String, String, Option<String>, String, bool)> =
                sqlx::query_as(POSTGRES_COLUMNS)
                    .bind(table)
                    .fetch_all(&mut *conn)
                    .await?;
            rows.into_iter()
                .map(|(name, data_type, nullable, default, identity, primary_key)| {
                    PostgresColumnInfo {
                        name,
                        data_type,
                        nullable: nullable.eq_ignore_ascii_case("YES"),
                        default,
                        is_identity: identity.eq_ignore_ascii_case("YES"),
                        primary_key,
                    }
                    .normalize()
                })
                .collect::<Vec<_>>()
        }
        Dialect::MySql => {
            let rows: Vec<(String, String, String, Option<String>, String, String)> =
                sqlx::query_as(MYSQL_COLUMNS)
                    .bind(table)
                    .fetch_all(&mut *conn)
                    .await?;
            rows.into_iter()
                .map(|(name, column_type, nullable, default, column_key, extra)| {
                    MySqlColumnInfo {
                        name,
                        column_type,
                        nullable: nullable.eq_ignore_ascii_case("YES"),
                        default,
                        column_key,
                        extra,
                    }
                    .normalize()
                })
                .collect()
        }
        Dialect::Sqlite => {
            let rows: Vec<(String, String, i64, Option<String>, i64)> =
                sqlx::query_as(SQLITE_COLUMNS)
                    .bind(table)
                    .fetch_all(&mut *conn)
                    .await?;
            rows.into_iter()
                .map(|(name, declared_type, not_null, default, pk)| {
                    SqliteColumnInfo {
                        name,
                        declared_type,
                        not_null: not_null != 0,
                        default,
                        pk,
                    }
                    .normalize()
                })
                .collect()
        }
    };

    if columns.is_empty() {
        return Err(CoreError::TableNotFound(table.to_string()).into());
    }

    let index_sql = match dialect {
        Dialect::Postgres => POSTGRES_INDEXES,
        Dialect::MySql => MYSQL_INDEXES,
        Dialect::Sqlite => SQLITE_INDEXES,
    };
    // uniqueness is read as an integer, which every backend can decode
    let rows: Vec<(String, String, i64)> = sqlx::query_as(index_sql)
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    Ok(NormalizedTable {
        name: table.to_string(),
        columns,
        indexes: group_indexes(rows),
    })
}

/// Folds `(index, column, unique)` rows into indexes, keeping row order
/// within each index.
fn group_indexes(rows: Vec<(String, String, i64)>) -> Vec<NormalizedIndex> {
    let mut grouped: BTreeMap<String, NormalizedIndex> = BTreeMap::new();
    for (name, column, unique) in rows {
        grouped
            .entry(name.clone())
            .or_insert_with(|| NormalizedIndex {
                name,
                columns: Vec::new(),
                unique: unique != 0,
            })
            .columns
            .push(column);
    }
    grouped.into_values().collect()
}

/// Compares the live definition of `expected` with the expected one.
pub async fn verify_table(
    conn: &mut AnyConnection,
    dialect: Dialect,
    expected: &Table,
) -> Result<TableDiff> {
    let actual = introspect_table(conn, dialect, &expected.name).await?;
    Ok(diff_tables(&NormalizedTable::from_table(expected), &actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_index_rows() {
        let rows = vec![
            ("idx_b".to_string(), "x".to_string(), 0),
            ("idx_a".to_string(), "created_at".to_string(), 0),
            ("idx_a".to_string(), "id".to_string(), 0),
            ("uq_c".to_string(), "code".to_string(), 1),
        ];
        let indexes = group_indexes(rows);
        assert_eq!(indexes.len(), 3);
        assert_eq!(indexes[0].name, "idx_a");
        assert_eq!(indexes[0].columns, vec!["created_at", "id"]);
        assert!(indexes[2].unique);
    }
}

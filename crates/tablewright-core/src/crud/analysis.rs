//! Per-table metadata driving CRUD generation.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::schema::{
    CREATED_AT_COLUMN, Column, DELETED_AT_COLUMN, PUBLIC_ID_COLUMN, Table, UPDATED_AT_COLUMN,
};

/// Read-only facts about a table, computed once.
///
/// Every column other than the primary key lands in exactly one of
/// `auto_columns` and `user_columns`. `result_columns` is the read view:
/// everything but the primary key and the deletion marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableAnalysis {
    /// Table name.
    pub table: String,
    /// The primary key column.
    pub primary_key: Column,
    /// Whether a `public_id` column exists.
    pub has_public_id: bool,
    /// Whether a `created_at` column exists.
    pub has_created_at: bool,
    /// Whether an `updated_at` column exists.
    pub has_updated_at: bool,
    /// Whether a `deleted_at` column exists.
    pub has_deleted_at: bool,
    /// Columns the system fills: primary key, public id, timestamps.
    pub auto_columns: Vec<Column>,
    /// Columns the caller supplies.
    pub user_columns: Vec<Column>,
    /// Columns returned by reads.
    pub result_columns: Vec<Column>,
}

const AUTO_FILLED: [&str; 4] = [
    PUBLIC_ID_COLUMN,
    CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
    DELETED_AT_COLUMN,
];

impl TableAnalysis {
    /// Analyzes `table`. Fails if it has no primary key.
    pub fn new(table: &Table) -> Result<Self> {
        let primary_key = table.primary_key().cloned().ok_or_else(|| {
            Error::validation(format!("table '{}' has no primary key", table.name))
        })?;

        let (auto_columns, user_columns): (Vec<Column>, Vec<Column>) = table
            .columns
            .iter()
            .cloned()
            .partition(|c| c.primary_key || AUTO_FILLED.contains(&c.name.as_str()));

        let result_columns: Vec<Column> = table
            .columns
            .iter()
            .filter(|c| !c.primary_key && c.name != DELETED_AT_COLUMN)
            .cloned()
            .collect();

        Ok(Self {
            table: table.name.clone(),
            has_public_id: table.has_column(PUBLIC_ID_COLUMN),
            has_created_at: table.has_column(CREATED_AT_COLUMN),
            has_updated_at: table.has_column(UPDATED_AT_COLUMN),
            has_deleted_at: table.has_column(DELETED_AT_COLUMN),
            primary_key,
            auto_columns,
            user_columns,
            result_columns,
        })
    }

    /// Keyset pagination needs both a creation time and a public id.
    #[must_use]
    pub fn supports_keyset(&self) -> bool {
        self.has_created_at && self.has_public_id
    }

    /// Deletes are soft when a deletion marker exists.
    #[must_use]
    pub fn soft_delete(&self) -> bool {
        self.has_deleted_at
    }

    /// The column single rows are looked up by: the public id if present,
    /// else the primary key.
    #[must_use]
    pub fn lookup_column(&self) -> &str {
        if self.has_public_id {
            PUBLIC_ID_COLUMN
        } else {
            &self.primary_key.name
        }
    }

    /// Finds a caller-supplied column.
    #[must_use]
    pub fn user_column(&self, name: &str) -> Option<&Column> {
        self.user_columns.iter().find(|c| c.name == name)
    }

    /// The single column offset pagination orders by.
    #[must_use]
    pub fn offset_order_column(&self) -> &str {
        if self.has_created_at {
            CREATED_AT_COLUMN
        } else if self.has_public_id {
            PUBLIC_ID_COLUMN
        } else {
            &self.primary_key.name
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::schema::{Schema, TableBuilder, bigint, datetime, string, text};

    #[test]
    fn audit_table_flags() {
        let table = TableBuilder::with_audit_columns("users")
            .column(string("name").not_null())
            .build(&Schema::default())
            .unwrap();
        let analysis = TableAnalysis::new(&table).unwrap();
        assert!(analysis.has_public_id);
        assert!(analysis.has_created_at);
        assert!(analysis.has_updated_at);
        assert!(analysis.has_deleted_at);
        assert!(analysis.supports_keyset());
        assert_eq!(analysis.lookup_column(), "public_id");
        let users: Vec<_> = analysis.user_columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(users, vec!["name"]);
        let results: Vec<_> = analysis
            .result_columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            results,
            vec!["public_id", "created_at", "updated_at", "name"]
        );
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let table = TableBuilder::new("logs")
            .column(text("line"))
            .build(&Schema::default())
            .unwrap();
        assert!(matches!(
            TableAnalysis::new(&table),
            Err(Error::Validation(_))
        ));
    }

    /// Flags follow the columns and the partitions cover every non-key
    /// column exactly once, for all 16 presence combinations.
    #[test]
    fn flags_and_partitions_for_every_combination() {
        let optional = [
            PUBLIC_ID_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
            DELETED_AT_COLUMN,
        ];
        for mask in 0u8..16 {
            let mut builder = TableBuilder::new("items")
                .column(bigint("id").primary_key().auto_increment())
                .column(string("label"));
            let present: Vec<bool> = (0..4).map(|bit| mask & (1 << bit) != 0).collect();
            for (name, on) in optional.iter().zip(&present) {
                if *on {
                    builder = builder.column(if *name == PUBLIC_ID_COLUMN {
                        string(*name).not_null().unique()
                    } else {
                        datetime(*name)
                    });
                }
            }
            let table = builder.build(&Schema::default()).unwrap();
            let analysis = TableAnalysis::new(&table).unwrap();

            assert_eq!(
                [
                    analysis.has_public_id,
                    analysis.has_created_at,
                    analysis.has_updated_at,
                    analysis.has_deleted_at
                ]
                .to_vec(),
                present,
                "mask {mask}"
            );

            let auto: BTreeSet<&str> = analysis
                .auto_columns
                .iter()
                .filter(|c| !c.primary_key)
                .map(|c| c.name.as_str())
                .collect();
            let user: BTreeSet<&str> =
                analysis.user_columns.iter().map(|c| c.name.as_str()).collect();
            let non_key: BTreeSet<&str> = table
                .columns
                .iter()
                .filter(|c| !c.primary_key)
                .map(|c| c.name.as_str())
                .collect();
            assert!(auto.is_disjoint(&user));
            assert_eq!(auto.union(&user).copied().collect::<BTreeSet<_>>(), non_key);
            assert!(analysis.result_columns.iter().all(|c| !c.primary_key));
            assert!(
                analysis
                    .result_columns
                    .iter()
                    .all(|c| c.name != DELETED_AT_COLUMN)
            );
        }
    }
}

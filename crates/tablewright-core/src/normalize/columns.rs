//! Per-dialect column information as read from the catalog.
//!
//! Each decoder owns the dialect's autoincrement detection, since the signal
//! differs per engine.

use serde::{Deserialize, Serialize};

use super::diff::NormalizedColumn;
use super::{normalize_mysql_type, normalize_postgres_type, normalize_sqlite_type};

/// A row of `information_schema.columns` on Postgres, joined with the
/// primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresColumnInfo {
    /// Column name.
    pub name: String,
    /// `data_type` label.
    pub data_type: String,
    /// `is_nullable = 'YES'`.
    pub nullable: bool,
    /// `column_default` expression.
    pub default: Option<String>,
    /// `is_identity = 'YES'`.
    pub is_identity: bool,
    /// Whether the column belongs to the primary key.
    pub primary_key: bool,
}

impl PostgresColumnInfo {
    /// A sequence default or identity column is definitive. Without either,
    /// an integer primary key with no default at all is assumed to
    /// auto increment.
    #[must_use]
    pub fn normalize(&self) -> NormalizedColumn {
        let base_type = normalize_postgres_type(&self.data_type);
        let autoincrement = if self.is_identity {
            true
        } else {
            match self.default.as_deref() {
                Some(default) => default.contains("nextval("),
                None => self.primary_key && base_type.is_integral(),
            }
        };
        NormalizedColumn {
            name: self.name.clone(),
            base_type,
            nullable: self.nullable,
            primary_key: self.primary_key,
            autoincrement,
        }
    }
}

/// A row of `information_schema.columns` on MySQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlColumnInfo {
    /// Column name.
    pub name: String,
    /// `COLUMN_TYPE`, e.g. `tinyint(1)`.
    pub column_type: String,
    /// `IS_NULLABLE = 'YES'`.
    pub nullable: bool,
    /// `COLUMN_DEFAULT`.
    pub default: Option<String>,
    /// `COLUMN_KEY` (`PRI`, `UNI`, `MUL` or empty).
    pub column_key: String,
    /// `EXTRA`, e.g. `auto_increment`.
    pub extra: String,
}

impl MySqlColumnInfo {
    /// Normalizes the row.
    #[must_use]
    pub fn normalize(&self) -> NormalizedColumn {
        NormalizedColumn {
            name: self.name.clone(),
            base_type: normalize_mysql_type(&self.column_type, self.default.as_deref()),
            nullable: self.nullable,
            primary_key: self.column_key.eq_ignore_ascii_case("PRI"),
            autoincrement: self.extra.to_ascii_lowercase().contains("auto_increment"),
        }
    }
}

/// A row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, possibly empty.
    pub declared_type: String,
    /// `notnull` flag.
    pub not_null: bool,
    /// `dflt_value`.
    pub default: Option<String>,
    /// 1-based position in the primary key, 0 if not part of it.
    pub pk: i64,
}

impl SqliteColumnInfo {
    /// An `INTEGER PRIMARY KEY` aliases the rowid and is always assigned by
    /// the engine.
    #[must_use]
    pub fn normalize(&self) -> NormalizedColumn {
        let primary_key = self.pk > 0;
        NormalizedColumn {
            name: self.name.clone(),
            base_type: normalize_sqlite_type(&self.declared_type),
            nullable: !self.not_null && !primary_key,
            primary_key,
            autoincrement: primary_key && self.declared_type.trim().eq_ignore_ascii_case("INTEGER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::BaseType;

    fn pg(data_type: &str, default: Option<&str>, primary_key: bool) -> PostgresColumnInfo {
        PostgresColumnInfo {
            name: "id".into(),
            data_type: data_type.into(),
            nullable: false,
            default: default.map(str::to_string),
            is_identity: false,
            primary_key,
        }
    }

    #[test]
    fn postgres_autoincrement_detection() {
        let serial = pg("bigint", Some("nextval('users_id_seq'::regclass)"), true);
        assert!(serial.normalize().autoincrement);

        let identity = PostgresColumnInfo {
            is_identity: true,
            ..pg("integer", None, true)
        };
        assert!(identity.normalize().autoincrement);

        // no signal either way
        assert!(pg("integer", None, true).normalize().autoincrement);
        assert!(!pg("integer", Some("0"), true).normalize().autoincrement);
        assert!(!pg("integer", None, false).normalize().autoincrement);
        assert!(!pg("text", None, true).normalize().autoincrement);
    }

    #[test]
    fn mysql_reads_extra_and_key() {
        let col = MySqlColumnInfo {
            name: "id".into(),
            column_type: "bigint".into(),
            nullable: false,
            default: None,
            column_key: "PRI".into(),
            extra: "auto_increment".into(),
        };
        let normalized = col.normalize();
        assert!(normalized.primary_key);
        assert!(normalized.autoincrement);
        assert_eq!(normalized.base_type, BaseType::BigInt);
    }

    #[test]
    fn sqlite_integer_primary_key_is_rowid() {
        let col = SqliteColumnInfo {
            name: "id".into(),
            declared_type: "INTEGER".into(),
            not_null: false,
            default: None,
            pk: 1,
        };
        let normalized = col.normalize();
        assert!(normalized.autoincrement);
        assert!(!normalized.nullable);

        let text_key = SqliteColumnInfo {
            declared_type: "TEXT".into(),
            ..col
        };
        assert!(!text_key.normalize().autoincrement);
    }
}

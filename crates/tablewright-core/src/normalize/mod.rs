//! Cross-dialect type normalization and equivalence.
//!
//! Each dialect reports column types with its own labels (`int4`,
//! `character varying(255)`, `tinyint(1)`, `VARCHAR(40)`). The functions
//! here fold those labels onto [`BaseType`], and [`equivalent`] decides
//! whether two base types should be considered the same column type given
//! SQLite's loose type affinity.

mod columns;
mod diff;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

pub use columns::{MySqlColumnInfo, PostgresColumnInfo, SqliteColumnInfo};
pub use diff::{
    ColumnMismatch, MismatchField, NormalizedColumn, NormalizedIndex, NormalizedTable, TableDiff,
    diff_tables,
};

/// A column type as reported by a database, folded onto the model's types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Bounded string.
    String,
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Floating point.
    Float,
    /// Exact decimal.
    Decimal,
    /// Date or timestamp.
    DateTime,
    /// Binary blob.
    Binary,
    /// JSON document.
    Json,
    /// A label no table recognizes.
    Unknown,
}

impl BaseType {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::String => "string",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }

    /// Returns `true` for integer and bigint.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Integer | Self::BigInt)
    }
}

impl From<ColumnType> for BaseType {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Integer => Self::Integer,
            ColumnType::BigInt => Self::BigInt,
            ColumnType::String => Self::String,
            ColumnType::Text => Self::Text,
            ColumnType::Boolean => Self::Boolean,
            ColumnType::Float => Self::Float,
            ColumnType::Decimal => Self::Decimal,
            ColumnType::DateTime => Self::DateTime,
            ColumnType::Binary => Self::Binary,
            ColumnType::Json => Self::Json,
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ================================================================
// Equivalence
// ================================================================

/// Pairs that SQLite's affinity rules make indistinguishable.
const EQUIVALENT_PAIRS: &[(BaseType, BaseType)] = &[
    (BaseType::Integer, BaseType::BigInt),
    (BaseType::String, BaseType::Text),
    (BaseType::Float, BaseType::Decimal),
    (BaseType::Boolean, BaseType::Integer),
    (BaseType::DateTime, BaseType::Text),
    (BaseType::Json, BaseType::Text),
];

/// Returns `true` if `a` and `b` are equal or form one of the declared
/// equivalent pairs, in either order.
#[must_use]
pub fn equivalent(a: BaseType, b: BaseType) -> bool {
    a == b
        || EQUIVALENT_PAIRS
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

// ================================================================
// Label normalization
// ================================================================

const POSTGRES_TYPES: &[(&str, BaseType)] = &[
    ("smallint", BaseType::Integer),
    ("int2", BaseType::Integer),
    ("int", BaseType::Integer),
    ("int4", BaseType::Integer),
    ("integer", BaseType::Integer),
    ("smallserial", BaseType::Integer),
    ("serial", BaseType::Integer),
    ("serial4", BaseType::Integer),
    ("bigint", BaseType::BigInt),
    ("int8", BaseType::BigInt),
    ("bigserial", BaseType::BigInt),
    ("serial8", BaseType::BigInt),
    ("varchar", BaseType::String),
    ("character varying", BaseType::String),
    ("char", BaseType::String),
    ("character", BaseType::String),
    ("bpchar", BaseType::String),
    ("uuid", BaseType::String),
    ("text", BaseType::Text),
    ("bool", BaseType::Boolean),
    ("boolean", BaseType::Boolean),
    ("real", BaseType::Float),
    ("float4", BaseType::Float),
    ("float8", BaseType::Float),
    ("double precision", BaseType::Float),
    ("numeric", BaseType::Decimal),
    ("decimal", BaseType::Decimal),
    ("timestamp", BaseType::DateTime),
    ("timestamptz", BaseType::DateTime),
    ("timestamp with time zone", BaseType::DateTime),
    ("timestamp without time zone", BaseType::DateTime),
    ("date", BaseType::DateTime),
    ("bytea", BaseType::Binary),
    ("json", BaseType::Json),
    ("jsonb", BaseType::Json),
];

const MYSQL_TYPES: &[(&str, BaseType)] = &[
    ("smallint", BaseType::Integer),
    ("mediumint", BaseType::Integer),
    ("int", BaseType::Integer),
    ("integer", BaseType::Integer),
    ("bigint", BaseType::BigInt),
    ("varchar", BaseType::String),
    ("char", BaseType::String),
    ("tinytext", BaseType::Text),
    ("text", BaseType::Text),
    ("mediumtext", BaseType::Text),
    ("longtext", BaseType::Text),
    ("bool", BaseType::Boolean),
    ("boolean", BaseType::Boolean),
    ("float", BaseType::Float),
    ("double", BaseType::Float),
    ("double precision", BaseType::Float),
    ("real", BaseType::Float),
    ("decimal", BaseType::Decimal),
    ("numeric", BaseType::Decimal),
    ("datetime", BaseType::DateTime),
    ("timestamp", BaseType::DateTime),
    ("date", BaseType::DateTime),
    ("tinyblob", BaseType::Binary),
    ("blob", BaseType::Binary),
    ("mediumblob", BaseType::Binary),
    ("longblob", BaseType::Binary),
    ("binary", BaseType::Binary),
    ("varbinary", BaseType::Binary),
    ("json", BaseType::Json),
];

/// Splits a type label into its lowercase name, with parenthesized
/// arguments and MySQL sign/fill modifiers removed, and the first argument
/// list if there was one.
///
/// `timestamp(6) with time zone` becomes `("timestamp with time zone",
/// Some("6"))`.
fn split_label(label: &str) -> (String, Option<String>) {
    let mut name = String::new();
    let mut args: Option<String> = None;
    let mut depth = 0usize;
    for ch in label.trim().to_ascii_lowercase().chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth == 1 && args.is_none() {
                    args = Some(String::new());
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {
                if let Some(ref mut a) = args {
                    if depth == 1 {
                        a.push(ch);
                    }
                }
            }
            _ => name.push(ch),
        }
    }
    let name = name
        .split_whitespace()
        .filter(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ");
    (name, args.map(|a| a.trim().to_string()))
}

fn lookup(table: &[(&str, BaseType)], name: &str) -> BaseType {
    table
        .iter()
        .find(|(label, _)| *label == name)
        .map_or(BaseType::Unknown, |&(_, base)| base)
}

/// Normalizes a Postgres `data_type` or `udt_name` label.
#[must_use]
pub fn normalize_postgres_type(label: &str) -> BaseType {
    let (name, _) = split_label(label);
    lookup(POSTGRES_TYPES, &name)
}

/// Normalizes a MySQL `COLUMN_TYPE` label.
///
/// `tinyint` is the only ambiguous label: it is a boolean when declared as
/// `tinyint(1)` or when its default looks like a boolean, otherwise an
/// integer.
#[must_use]
pub fn normalize_mysql_type(label: &str, default: Option<&str>) -> BaseType {
    let (name, args) = split_label(label);
    if name == "tinyint" {
        let width_one = args.as_deref() == Some("1");
        if width_one || default.is_some_and(is_boolean_default) {
            return BaseType::Boolean;
        }
        return BaseType::Integer;
    }
    lookup(MYSQL_TYPES, &name)
}

fn is_boolean_default(default: &str) -> bool {
    let value = default.trim();
    let value = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value);
    matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "1" | "true" | "false" | "b'0'" | "b'1'"
    )
}

/// Normalizes a SQLite declared type.
///
/// Exact standard names are matched first, then the substring rules of
/// SQLite's affinity algorithm, extended to recognise the names this crate
/// itself emits (`BOOLEAN`, `DATETIME`, `JSON`).
#[must_use]
pub fn normalize_sqlite_type(label: &str) -> BaseType {
    let upper = label.trim().to_ascii_uppercase();
    match upper.as_str() {
        "INTEGER" => return BaseType::Integer,
        "TEXT" => return BaseType::Text,
        "REAL" => return BaseType::Float,
        "BLOB" => return BaseType::Binary,
        "NUMERIC" => return BaseType::Decimal,
        "" => return BaseType::Unknown,
        _ => {}
    }

    let has = |needle: &str| upper.contains(needle);
    if has("INT") {
        if has("BIGINT") {
            BaseType::BigInt
        } else {
            BaseType::Integer
        }
    } else if has("BOOL") {
        BaseType::Boolean
    } else if has("DATE") || has("TIME") {
        BaseType::DateTime
    } else if has("JSON") {
        BaseType::Json
    } else if has("CHAR") || has("CLOB") || has("TEXT") {
        if has("VARCHAR") {
            BaseType::String
        } else {
            BaseType::Text
        }
    } else if has("BLOB") || has("BINARY") {
        BaseType::Binary
    } else if has("REAL") || has("FLOA") || has("DOUB") {
        BaseType::Float
    } else if has("DEC") || has("NUM") {
        BaseType::Decimal
    } else {
        BaseType::Unknown
    }
}

//! Column definitions and the fluent column builder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dialect-agnostic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Bounded string (VARCHAR).
    String,
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Double precision float.
    Float,
    /// Exact decimal.
    Decimal,
    /// Timestamp.
    DateTime,
    /// Binary blob.
    Binary,
    /// JSON document.
    Json,
}

impl ColumnType {
    /// Every column type, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Integer,
        Self::BigInt,
        Self::String,
        Self::Text,
        Self::Boolean,
        Self::Float,
        Self::Decimal,
        Self::DateTime,
        Self::Binary,
        Self::Json,
    ];

    /// Returns the lowercase name used in snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
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

    /// Returns `true` for the integral types that may auto increment.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Integer | Self::BigInt)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// The dialect's current-time expression.
    CurrentTimestamp,
    /// Raw SQL expression, emitted verbatim.
    Expression(String),
}

impl DefaultValue {
    /// Renders the value as a portable SQL literal.
    ///
    /// Dialects override booleans and [`DefaultValue::CurrentTimestamp`].
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: String,
    /// Base type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether this column is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether values must be unique.
    #[serde(default)]
    pub unique: bool,
    /// Whether the database assigns values (identity/serial/rowid).
    #[serde(default)]
    pub auto_increment: bool,
    /// Default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl Column {
    /// Creates a nullable column without constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
        }
    }
}

/// Fluent builder for [`Column`].
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    column: Column,
}

impl ColumnBuilder {
    /// Starts a nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            column: Column::new(name, column_type),
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.column.nullable = false;
        self
    }

    /// Marks the column nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.column.nullable = true;
        self
    }

    /// Marks the column as primary key (implies NOT NULL).
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.column.primary_key = true;
        self.column.nullable = false;
        self
    }

    /// Marks the column unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.column.unique = true;
        self
    }

    /// Lets the database assign values. Only meaningful on integral
    /// primary keys.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.column.auto_increment = true;
        self
    }

    /// Sets an arbitrary default.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.column.default = Some(value);
        self
    }

    /// Sets a boolean default.
    #[must_use]
    pub fn default_bool(self, value: bool) -> Self {
        self.default(DefaultValue::Boolean(value))
    }

    /// Sets an integer default.
    #[must_use]
    pub fn default_int(self, value: i64) -> Self {
        self.default(DefaultValue::Integer(value))
    }

    /// Sets a string default.
    #[must_use]
    pub fn default_str(self, value: impl Into<String>) -> Self {
        self.default(DefaultValue::String(value.into()))
    }

    /// Defaults to the current time.
    #[must_use]
    pub fn default_now(self) -> Self {
        self.default(DefaultValue::CurrentTimestamp)
    }

    /// Finishes the column.
    #[must_use]
    pub fn build(self) -> Column {
        self.column
    }
}

impl From<ColumnBuilder> for Column {
    fn from(builder: ColumnBuilder) -> Self {
        builder.build()
    }
}

/// Starts an INTEGER column.
#[must_use]
pub fn integer(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Integer)
}

/// Starts a BIGINT column.
#[must_use]
pub fn bigint(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::BigInt)
}

/// Starts a bounded string column.
#[must_use]
pub fn string(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::String)
}

/// Starts a TEXT column.
#[must_use]
pub fn text(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Text)
}

/// Starts a BOOLEAN column.
#[must_use]
pub fn boolean(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Boolean)
}

/// Starts a floating point column.
#[must_use]
pub fn float(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Float)
}

/// Starts a DECIMAL column.
#[must_use]
pub fn decimal(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Decimal)
}

/// Starts a timestamp column.
#[must_use]
pub fn datetime(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::DateTime)
}

/// Starts a binary column.
#[must_use]
pub fn binary(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Binary)
}

/// Starts a JSON column.
#[must_use]
pub fn json(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_implies_not_null() {
        let col = bigint("id").primary_key().auto_increment().build();
        assert!(col.primary_key);
        assert!(col.auto_increment);
        assert!(!col.nullable);
    }

    #[test]
    fn default_value_to_sql() {
        assert_eq!(DefaultValue::Null.to_sql(), "NULL");
        assert_eq!(DefaultValue::Integer(42).to_sql(), "42");
        assert_eq!(DefaultValue::String("it's".into()).to_sql(), "'it''s'");
        assert_eq!(DefaultValue::Boolean(false).to_sql(), "FALSE");
        assert_eq!(
            DefaultValue::CurrentTimestamp.to_sql(),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn column_type_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnType::DateTime).unwrap();
        assert_eq!(json, "\"datetime\"");
        let back: ColumnType = serde_json::from_str("\"bigint\"").unwrap();
        assert_eq!(back, ColumnType::BigInt);
    }
}

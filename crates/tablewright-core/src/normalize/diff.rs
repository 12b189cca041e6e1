//! Comparison of an expected table against what a database reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BaseType, equivalent};
use crate::schema::Table;

/// The comparable projection of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedColumn {
    /// Column name.
    pub name: String,
    /// Folded type.
    pub base_type: BaseType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the column is the primary key.
    pub primary_key: bool,
    /// Whether the database assigns values.
    pub autoincrement: bool,
}

/// The comparable projection of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIndex {
    /// Index name; informational only, names differ between dialects.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// UNIQUE index.
    pub unique: bool,
}

impl NormalizedIndex {
    /// Matching key: sorted column names plus uniqueness.
    #[must_use]
    pub fn key(&self) -> (Vec<String>, bool) {
        let mut columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();
        columns.sort();
        (columns, self.unique)
    }
}

/// The comparable projection of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTable {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<NormalizedColumn>,
    /// Indexes.
    pub indexes: Vec<NormalizedIndex>,
}

impl NormalizedTable {
    /// Projects a model table, the expected side of a comparison.
    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        Self {
            name: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| NormalizedColumn {
                    name: c.name.clone(),
                    base_type: c.column_type.into(),
                    nullable: c.nullable,
                    primary_key: c.primary_key,
                    autoincrement: c.auto_increment,
                })
                .collect(),
            indexes: table
                .indexes
                .iter()
                .map(|i| NormalizedIndex {
                    name: i.name.clone(),
                    columns: i.columns.clone(),
                    unique: i.unique,
                })
                .collect(),
        }
    }
}

/// Which attribute of a column differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchField {
    /// Same name up to case.
    Name,
    /// Types are not equivalent.
    Type,
    /// Nullability differs.
    Nullable,
    /// Primary key membership differs.
    PrimaryKey,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Type => "type",
            Self::Nullable => "nullable",
            Self::PrimaryKey => "primary key",
        })
    }
}

/// One differing attribute of a column present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMismatch {
    /// Expected column name.
    pub column: String,
    /// Differing attribute.
    pub field: MismatchField,
    /// Expected value, rendered.
    pub expected: String,
    /// Actual value, rendered.
    pub actual: String,
}

/// Differences between an expected and an actual table.
///
/// This is a report, not an error: callers decide which entries matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// Expected columns the database lacks.
    pub missing_columns: Vec<String>,
    /// Database columns the model does not declare.
    pub extra_columns: Vec<String>,
    /// Attribute mismatches on shared columns.
    pub mismatches: Vec<ColumnMismatch>,
    /// Expected indexes with no counterpart of the same key.
    pub missing_indexes: Vec<NormalizedIndex>,
}

impl TableDiff {
    /// Returns `true` if both sides agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing_columns.is_empty()
            && self.extra_columns.is_empty()
            && self.mismatches.is_empty()
            && self.missing_indexes.is_empty()
    }
}

impl fmt::Display for TableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{}: matches", self.table);
        }
        writeln!(f, "{}:", self.table)?;
        for column in &self.missing_columns {
            writeln!(f, "  missing column {column}")?;
        }
        for column in &self.extra_columns {
            writeln!(f, "  extra column {column}")?;
        }
        for m in &self.mismatches {
            writeln!(
                f,
                "  {} {}: expected {}, found {}",
                m.column, m.field, m.expected, m.actual
            )?;
        }
        for index in &self.missing_indexes {
            let kind = if index.unique { "unique index" } else { "index" };
            writeln!(f, "  missing {kind} on ({})", index.columns.join(", "))?;
        }
        Ok(())
    }
}

/// Compares `expected` with `actual`.
///
/// Columns are paired by case-insensitive name. Types are compared with
/// [`equivalent`] and indexes by [`NormalizedIndex::key`].
#[must_use]
pub fn diff_tables(expected: &NormalizedTable, actual: &NormalizedTable) -> TableDiff {
    let actual_columns: BTreeMap<String, &NormalizedColumn> = actual
        .columns
        .iter()
        .map(|c| (c.name.to_ascii_lowercase(), c))
        .collect();

    let mut diff = TableDiff {
        table: expected.name.clone(),
        ..TableDiff::default()
    };

    for want in &expected.columns {
        let Some(have) = actual_columns.get(&want.name.to_ascii_lowercase()) else {
            diff.missing_columns.push(want.name.clone());
            continue;
        };
        let mut mismatch = |field, expected: String, actual: String| {
            diff.mismatches.push(ColumnMismatch {
                column: want.name.clone(),
                field,
                expected,
                actual,
            });
        };
        if want.name != have.name {
            mismatch(MismatchField::Name, want.name.clone(), have.name.clone());
        }
        if !equivalent(want.base_type, have.base_type) {
            mismatch(
                MismatchField::Type,
                want.base_type.to_string(),
                have.base_type.to_string(),
            );
        }
        if want.nullable != have.nullable {
            mismatch(
                MismatchField::Nullable,
                want.nullable.to_string(),
                have.nullable.to_string(),
            );
        }
        if want.primary_key != have.primary_key {
            mismatch(
                MismatchField::PrimaryKey,
                want.primary_key.to_string(),
                have.primary_key.to_string(),
            );
        }
    }

    for have in &actual.columns {
        let known = expected
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&have.name));
        if !known {
            diff.extra_columns.push(have.name.clone());
        }
    }

    for index in &expected.indexes {
        let key = index.key();
        if !actual.indexes.iter().any(|i| i.key() == key) {
            diff.missing_indexes.push(index.clone());
        }
    }

    diff
}

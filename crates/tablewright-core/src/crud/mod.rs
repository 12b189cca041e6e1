//! CRUD and pagination statement generation.
//!
//! [`generate`] turns a [`Table`] into a [`CrudBundle`]: record shapes for
//! rows and parameters plus literal SQL per statement and dialect. The
//! bundle is plain data; turning it into source code is left to callers.
//!
//! Tables with both `created_at` and `public_id` are listed with keyset
//! pagination ordered by `(created_at, id)`. The statement fetches
//! `limit + 1` rows and [`pagination::paginate`] turns the surplus row into
//! a cursor. Other tables fall back to LIMIT/OFFSET.
//!
//! # Example
//!
//! ```rust
//! use tablewright_core::crud::{CrudKind, CrudOptions, generate};
//! use tablewright_core::dialect::Dialect;
//! use tablewright_core::schema::{Schema, TableBuilder, string};
//!
//! let table = TableBuilder::with_audit_columns("users")
//!     .column(string("name").not_null())
//!     .build(&Schema::default())
//!     .unwrap();
//!
//! let bundle = generate(&table, &CrudOptions::default(), &[Dialect::Sqlite]).unwrap();
//! let list = bundle.statement(CrudKind::List).unwrap();
//! let sql = &list.sql[&Dialect::Sqlite].text;
//! assert!(sql.ends_with("ORDER BY \"created_at\" DESC, \"id\" DESC LIMIT ?"));
//! ```

mod analysis;
pub mod pagination;
mod sql;

use std::collections::BTreeMap;
use std::fmt;

use heck::ToUpperCamelCase;
use serde::{Deserialize, Serialize};

pub use analysis::TableAnalysis;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::schema::{CREATED_AT_COLUMN, Column, ColumnType, PUBLIC_ID_COLUMN, Table};

/// Per-table generator options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudOptions {
    /// Tenant or owner column added to every WHERE clause and INSERT.
    #[serde(default)]
    pub scope_column: Option<String>,
    /// List oldest first instead of newest first.
    #[serde(default)]
    pub ascending: bool,
}

/// The generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudKind {
    /// Fetch one row.
    Get,
    /// Fetch a page of rows.
    List,
    /// Insert a row.
    Insert,
    /// Update a row's caller-supplied columns.
    Update,
    /// Soft delete when the table supports it, otherwise a real DELETE.
    Delete,
    /// Real DELETE next to a soft delete.
    HardDelete,
}

impl CrudKind {
    /// UpperCamelCase prefix used in shape names.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::List => "List",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::HardDelete => "HardDelete",
        }
    }
}

impl fmt::Display for CrudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A field of a record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column or parameter name.
    pub name: String,
    /// Value type.
    pub column_type: ColumnType,
    /// Whether the value may be absent.
    pub nullable: bool,
}

impl Field {
    fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
        }
    }

    fn from_column(column: &Column) -> Self {
        Self::new(column.name.clone(), column.column_type, column.nullable)
    }

    fn required(column: &Column) -> Self {
        Self::new(column.name.clone(), column.column_type, false)
    }
}

/// A named record: a row, a parameter set or a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordShape {
    /// UpperCamelCase name.
    pub name: String,
    /// Fields in order.
    pub fields: Vec<Field>,
}

impl RecordShape {
    /// Looks up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Statement text with the parameter field bound at each placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundSql {
    /// Literal SQL.
    pub text: String,
    /// For numbered placeholders, the field of `$1`, `$2`, … in order. For
    /// `?`, the field of each occurrence in textual order.
    pub binds: Vec<String>,
}

/// How a List statement pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Pagination {
    /// `(created_at, id)` keyset; binds `fetch_limit = limit + 1`.
    Keyset {
        /// Sort direction.
        ascending: bool,
    },
    /// LIMIT/OFFSET on a single column.
    Offset {
        /// Sort column.
        order_by: String,
        /// Sort direction.
        ascending: bool,
    },
}

/// One generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudStatement {
    /// Which statement.
    pub kind: CrudKind,
    /// Parameters.
    pub params: RecordShape,
    /// Returned record, if any.
    pub result: Option<RecordShape>,
    /// Whether several rows come back.
    pub returns_many: bool,
    /// Paging strategy of a List.
    pub pagination: Option<Pagination>,
    /// SQL per requested dialect.
    pub sql: BTreeMap<Dialect, BoundSql>,
}

/// Everything generated for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudBundle {
    /// Table name.
    pub table: String,
    /// The read shape.
    pub row: RecordShape,
    /// Statements, in [`CrudKind`] order.
    pub operations: Vec<CrudStatement>,
}

impl CrudBundle {
    /// Finds the statement of a kind.
    #[must_use]
    pub fn statement(&self, kind: CrudKind) -> Option<&CrudStatement> {
        self.operations.iter().find(|s| s.kind == kind)
    }
}

/// Drops a plural ending: `categories` → `category`, `users` → `user`.
fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        format!("{stem}y")
    } else if name.ends_with("ss") {
        name.to_string()
    } else if let Some(stem) = name.strip_suffix('s') {
        stem.to_string()
    } else {
        name.to_string()
    }
}

struct Names {
    singular: String,
    plural: String,
}

impl Names {
    fn new(table: &str) -> Self {
        Self {
            singular: singularize(table).to_upper_camel_case(),
            plural: table.to_upper_camel_case(),
        }
    }

    fn row(&self) -> String {
        format!("{}Row", self.singular)
    }

    fn params(&self, kind: CrudKind) -> String {
        let entity = if kind == CrudKind::List {
            &self.plural
        } else {
            &self.singular
        };
        format!("{}{entity}Params", kind.prefix())
    }

    fn result(&self, kind: CrudKind) -> String {
        format!("{}{}Result", kind.prefix(), self.singular)
    }
}

/// Generates the CRUD statements for `table` in each of `dialects`.
///
/// Fails if the table has no primary key or if the scope column is not a
/// caller-supplied column of the table.
pub fn generate(table: &Table, options: &CrudOptions, dialects: &[Dialect]) -> Result<CrudBundle> {
    let analysis = TableAnalysis::new(table)?;
    let scope = match options.scope_column.as_deref() {
        None => None,
        Some(name) => Some(analysis.user_column(name).ok_or_else(|| {
            if table.has_column(name) {
                Error::validation(format!(
                    "scope column '{name}' of table '{}' is filled automatically",
                    table.name
                ))
            } else {
                Error::validation(format!(
                    "scope column '{name}' does not exist in table '{}'",
                    table.name
                ))
            }
        })?),
    };

    let names = Names::new(&table.name);
    let row = RecordShape {
        name: names.row(),
        fields: analysis.result_columns.iter().map(Field::from_column).collect(),
    };

    let contexts: Vec<sql::Context<'_>> = dialects
        .iter()
        .map(|&dialect| sql::Context {
            dialect,
            analysis: &analysis,
            scope,
            ascending: options.ascending,
        })
        .collect();
    let render = |f: fn(&sql::Context<'_>) -> BoundSql| -> BTreeMap<Dialect, BoundSql> {
        contexts.iter().map(|cx| (cx.dialect, f(cx))).collect()
    };

    let lookup = table
        .column(analysis.lookup_column())
        .map(Field::required)
        .ok_or_else(|| Error::column_not_found(&table.name, analysis.lookup_column()))?;
    let scope_field = scope.map(Field::required);
    let settable: Vec<Field> = analysis
        .user_columns
        .iter()
        .filter(|c| Some(&c.name) != scope.map(|s| &s.name))
        .map(Field::from_column)
        .collect();

    let params = |kind: CrudKind, fields: Vec<Field>| RecordShape {
        name: names.params(kind),
        fields,
    };
    let key_params = |kind: CrudKind| {
        let mut fields = vec![lookup.clone()];
        fields.extend(scope_field.clone());
        params(kind, fields)
    };

    let mut operations = Vec::new();

    operations.push(CrudStatement {
        kind: CrudKind::Get,
        params: key_params(CrudKind::Get),
        result: Some(row.clone()),
        returns_many: false,
        pagination: None,
        sql: render(sql::get),
    });

    let mut list_fields: Vec<Field> = scope_field.iter().cloned().collect();
    let list = if analysis.supports_keyset() {
        let created = table
            .column(CREATED_AT_COLUMN)
            .map_or(ColumnType::DateTime, |c| c.column_type);
        let public_id = table
            .column(PUBLIC_ID_COLUMN)
            .map_or(ColumnType::String, |c| c.column_type);
        list_fields.extend([
            Field::new(sql::CURSOR_CREATED_AT, created, true),
            Field::new(sql::CURSOR_PUBLIC_ID, public_id, true),
            Field::new(sql::CREATED_AFTER, created, true),
            Field::new(sql::CREATED_BEFORE, created, true),
            Field::new(sql::FETCH_LIMIT, ColumnType::BigInt, false),
        ]);
        CrudStatement {
            kind: CrudKind::List,
            params: params(CrudKind::List, list_fields),
            result: Some(row.clone()),
            returns_many: true,
            pagination: Some(Pagination::Keyset {
                ascending: options.ascending,
            }),
            sql: render(sql::list_keyset),
        }
    } else {
        list_fields.extend([
            Field::new(sql::LIMIT, ColumnType::BigInt, false),
            Field::new(sql::OFFSET, ColumnType::BigInt, false),
        ]);
        CrudStatement {
            kind: CrudKind::List,
            params: params(CrudKind::List, list_fields),
            result: Some(row.clone()),
            returns_many: true,
            pagination: Some(Pagination::Offset {
                order_by: analysis.offset_order_column().to_string(),
                ascending: options.ascending,
            }),
            sql: render(sql::list_offset),
        }
    };
    operations.push(list);

    let mut insert_fields = Vec::new();
    if analysis.has_public_id {
        insert_fields.extend(table.column(PUBLIC_ID_COLUMN).map(Field::required));
    }
    insert_fields.extend(settable.iter().cloned());
    insert_fields.extend(scope_field.clone());
    let insert_result = analysis.has_public_id.then(|| RecordShape {
        name: names.result(CrudKind::Insert),
        fields: table
            .column(PUBLIC_ID_COLUMN)
            .map(Field::required)
            .into_iter()
            .collect(),
    });
    operations.push(CrudStatement {
        kind: CrudKind::Insert,
        params: params(CrudKind::Insert, insert_fields),
        result: insert_result,
        returns_many: false,
        pagination: None,
        sql: render(sql::insert),
    });

    // a table with nothing to set gets no Update
    if !settable.is_empty() || analysis.has_updated_at {
        let updates: BTreeMap<Dialect, BoundSql> = contexts
            .iter()
            .filter_map(|cx| sql::update(cx).map(|s| (cx.dialect, s)))
            .collect();
        let mut fields = settable.clone();
        fields.push(lookup.clone());
        fields.extend(scope_field.clone());
        operations.push(CrudStatement {
            kind: CrudKind::Update,
            params: params(CrudKind::Update, fields),
            result: None,
            returns_many: false,
            pagination: None,
            sql: updates,
        });
    }

    if analysis.soft_delete() {
        operations.push(CrudStatement {
            kind: CrudKind::Delete,
            params: key_params(CrudKind::Delete),
            result: None,
            returns_many: false,
            pagination: None,
            sql: render(sql::soft_delete),
        });
        operations.push(CrudStatement {
            kind: CrudKind::HardDelete,
            params: key_params(CrudKind::HardDelete),
            result: None,
            returns_many: false,
            pagination: None,
            sql: render(sql::hard_delete),
        });
    } else {
        operations.push(CrudStatement {
            kind: CrudKind::Delete,
            params: key_params(CrudKind::Delete),
            result: None,
            returns_many: false,
            pagination: None,
            sql: render(sql::hard_delete),
        });
    }

    Ok(CrudBundle {
        table: table.name.clone(),
        row,
        operations,
    })
}

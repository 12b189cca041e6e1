//! Literal SQL for the CRUD statements.
//!
//! Placeholders are bound left to right while the text is built, so the
//! bind list of `?` dialects follows the textual order.

use super::{BoundSql, TableAnalysis};
use crate::dialect::Dialect;
use crate::schema::{
    CREATED_AT_COLUMN, Column, ColumnType, DELETED_AT_COLUMN, PUBLIC_ID_COLUMN, UPDATED_AT_COLUMN,
};

/// Parameter names shared by the List statement and its params shape.
pub(super) const CURSOR_CREATED_AT: &str = "cursor_created_at";
pub(super) const CURSOR_PUBLIC_ID: &str = "cursor_public_id";
pub(super) const CREATED_AFTER: &str = "created_after";
pub(super) const CREATED_BEFORE: &str = "created_before";
pub(super) const FETCH_LIMIT: &str = "fetch_limit";
pub(super) const LIMIT: &str = "limit";
pub(super) const OFFSET: &str = "offset";

struct Binder {
    dialect: Dialect,
    binds: Vec<String>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            binds: Vec::new(),
        }
    }

    /// Numbered dialects reuse the placeholder of a name bound earlier.
    fn bind(&mut self, name: &str) -> String {
        if self.dialect.numbered_placeholders() {
            if let Some(pos) = self.binds.iter().position(|b| b == name) {
                return self.dialect.placeholder(pos + 1);
            }
        }
        self.binds.push(name.to_string());
        self.dialect.placeholder(self.binds.len())
    }

    /// Binds an optional parameter. Postgres cannot infer the type of a
    /// parameter that is only tested for NULL, so it gets an explicit cast.
    fn bind_optional(&mut self, name: &str, column_type: ColumnType) -> String {
        let placeholder = self.bind(name);
        match self.dialect {
            Dialect::Postgres => format!(
                "CAST({placeholder} AS {})",
                self.dialect.column_type(column_type)
            ),
            Dialect::MySql | Dialect::Sqlite => placeholder,
        }
    }

    fn finish(self, text: String) -> BoundSql {
        BoundSql {
            text,
            binds: self.binds,
        }
    }
}

/// Everything a statement renderer needs.
pub(super) struct Context<'a> {
    pub dialect: Dialect,
    pub analysis: &'a TableAnalysis,
    pub scope: Option<&'a Column>,
    pub ascending: bool,
}

impl Context<'_> {
    fn q(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn table(&self) -> String {
        self.q(&self.analysis.table)
    }

    fn column_type(&self, name: &str) -> ColumnType {
        self.analysis
            .result_columns
            .iter()
            .find(|c| c.name == name)
            .map_or(ColumnType::Text, |c| c.column_type)
    }

    fn select_list(&self) -> String {
        self.analysis
            .result_columns
            .iter()
            .map(|c| self.q(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Columns the caller sets on insert and update. The scope column is
    /// handled separately.
    fn settable(&self) -> impl Iterator<Item = &Column> + '_ {
        let scope = self.scope.map(|c| c.name.as_str());
        self.analysis
            .user_columns
            .iter()
            .filter(move |c| Some(c.name.as_str()) != scope)
    }

    fn scope_predicate(&self, b: &mut Binder) -> Option<String> {
        self.scope
            .map(|col| format!("{} = {}", self.q(&col.name), b.bind(&col.name)))
    }

    fn live_predicate(&self) -> Option<String> {
        self.analysis
            .soft_delete()
            .then(|| format!("{} IS NULL", self.q(DELETED_AT_COLUMN)))
    }

    /// Lookup, scope and (optionally) the not-deleted guard.
    fn row_predicates(&self, b: &mut Binder, only_live: bool) -> Vec<String> {
        let lookup = self.analysis.lookup_column();
        let mut preds = vec![format!("{} = {}", self.q(lookup), b.bind(lookup))];
        preds.extend(self.scope_predicate(b));
        if only_live {
            preds.extend(self.live_predicate());
        }
        preds
    }

    fn direction(&self) -> &'static str {
        if self.ascending { "ASC" } else { "DESC" }
    }
}

fn where_clause(preds: &[String]) -> String {
    if preds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", preds.join(" AND "))
    }
}

pub(super) fn get(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let select = format!("SELECT {} FROM {}", cx.select_list(), cx.table());
    let preds = cx.row_predicates(&mut b, true);
    b.finish(format!("{select}{}", where_clause(&preds)))
}

pub(super) fn list_keyset(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let created = cx.q(CREATED_AT_COLUMN);
    let id = cx.q(&cx.analysis.primary_key.name);
    let created_type = cx.column_type(CREATED_AT_COLUMN);
    let cmp = if cx.ascending { ">" } else { "<" };

    let mut preds = Vec::new();
    preds.extend(cx.scope_predicate(&mut b));
    preds.extend(cx.live_predicate());

    let c1 = b.bind_optional(CURSOR_CREATED_AT, created_type);
    let c2 = b.bind_optional(CURSOR_CREATED_AT, created_type);
    let c3 = b.bind_optional(CURSOR_CREATED_AT, created_type);
    let public_id = b.bind_optional(CURSOR_PUBLIC_ID, cx.column_type(PUBLIC_ID_COLUMN));
    preds.push(format!(
        "({c1} IS NULL OR {created} {cmp} {c2} OR ({created} = {c3} AND {id} {cmp} \
         (SELECT {id} FROM {} WHERE {} = {public_id})))",
        cx.table(),
        cx.q(PUBLIC_ID_COLUMN),
    ));

    let a1 = b.bind_optional(CREATED_AFTER, created_type);
    let a2 = b.bind_optional(CREATED_AFTER, created_type);
    preds.push(format!("({a1} IS NULL OR {created} > {a2})"));
    let b1 = b.bind_optional(CREATED_BEFORE, created_type);
    let b2 = b.bind_optional(CREATED_BEFORE, created_type);
    preds.push(format!("({b1} IS NULL OR {created} < {b2})"));

    let dir = cx.direction();
    let limit = b.bind(FETCH_LIMIT);
    b.finish(format!(
        "SELECT {} FROM {}{} ORDER BY {created} {dir}, {id} {dir} LIMIT {limit}",
        cx.select_list(),
        cx.table(),
        where_clause(&preds)
    ))
}

pub(super) fn list_offset(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let mut preds = Vec::new();
    preds.extend(cx.scope_predicate(&mut b));
    preds.extend(cx.live_predicate());
    let limit = b.bind(LIMIT);
    let offset = b.bind(OFFSET);
    b.finish(format!(
        "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {limit} OFFSET {offset}",
        cx.select_list(),
        cx.table(),
        where_clause(&preds),
        cx.q(cx.analysis.offset_order_column()),
        cx.direction()
    ))
}

pub(super) fn insert(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let mut columns = Vec::new();
    let mut values = Vec::new();

    if cx.analysis.has_public_id {
        columns.push(cx.q(PUBLIC_ID_COLUMN));
        values.push(b.bind(PUBLIC_ID_COLUMN));
    }
    for col in cx.settable() {
        columns.push(cx.q(&col.name));
        values.push(b.bind(&col.name));
    }
    if let Some(scope) = cx.scope {
        columns.push(cx.q(&scope.name));
        values.push(b.bind(&scope.name));
    }
    for (present, name) in [
        (cx.analysis.has_created_at, CREATED_AT_COLUMN),
        (cx.analysis.has_updated_at, UPDATED_AT_COLUMN),
    ] {
        if present {
            columns.push(cx.q(name));
            values.push(cx.dialect.now().to_string());
        }
    }

    let mut text = format!("INSERT INTO {}", cx.table());
    if columns.is_empty() {
        text.push_str(match cx.dialect {
            Dialect::MySql => " () VALUES ()",
            Dialect::Postgres | Dialect::Sqlite => " DEFAULT VALUES",
        });
    } else {
        text.push_str(&format!(
            " ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        ));
    }
    if cx.analysis.has_public_id && cx.dialect.supports_returning() {
        text.push_str(&format!(" RETURNING {}", cx.q(PUBLIC_ID_COLUMN)));
    }
    b.finish(text)
}

/// `None` when the table has nothing an UPDATE could set.
pub(super) fn update(cx: &Context<'_>) -> Option<BoundSql> {
    let mut b = Binder::new(cx.dialect);
    let mut sets: Vec<String> = cx
        .settable()
        .map(|col| format!("{} = {}", cx.q(&col.name), b.bind(&col.name)))
        .collect();
    if cx.analysis.has_updated_at {
        sets.push(format!("{} = {}", cx.q(UPDATED_AT_COLUMN), cx.dialect.now()));
    }
    if sets.is_empty() {
        return None;
    }
    let preds = cx.row_predicates(&mut b, true);
    Some(b.finish(format!(
        "UPDATE {} SET {}{}",
        cx.table(),
        sets.join(", "),
        where_clause(&preds)
    )))
}

pub(super) fn soft_delete(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let preds = cx.row_predicates(&mut b, true);
    b.finish(format!(
        "UPDATE {} SET {} = {}{}",
        cx.table(),
        cx.q(DELETED_AT_COLUMN),
        cx.dialect.now(),
        where_clause(&preds)
    ))
}

pub(super) fn hard_delete(cx: &Context<'_>) -> BoundSql {
    let mut b = Binder::new(cx.dialect);
    let preds = cx.row_predicates(&mut b, false);
    b.finish(format!("DELETE FROM {}{}", cx.table(), where_clause(&preds)))
}

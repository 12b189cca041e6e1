//! Integration tests for the CRUD generator.
//!
//! Tables are built through the public builders and compiled for every
//! dialect, then the statement text is checked for the paging strategy and
//! for scope enforcement.

use tablewright_core::crud::{CrudKind, CrudOptions, Pagination, generate};
use tablewright_core::dialect::Dialect;
use tablewright_core::schema::{Schema, Table, TableBuilder, bigint, datetime, integer, string, text};

// =============================================================================
// Fixtures
// =============================================================================

fn users() -> Table {
    TableBuilder::with_audit_columns("users")
        .column(string("name").not_null())
        .column(bigint("account_id").not_null())
        .build(&Schema::default())
        .unwrap()
}

/// No public id and no creation time.
fn counters() -> Table {
    TableBuilder::new("counters")
        .column(integer("id").primary_key().auto_increment())
        .column(string("label").not_null())
        .column(bigint("value").not_null().default_int(0))
        .build(&Schema::default())
        .unwrap()
}

// =============================================================================
// Paging strategy
// =============================================================================

#[test]
fn audit_table_lists_by_keyset_on_sqlite() {
    let bundle = generate(&users(), &CrudOptions::default(), &[Dialect::Sqlite]).unwrap();
    let list = bundle.statement(CrudKind::List).unwrap();
    let sql = &list.sql[&Dialect::Sqlite].text;

    assert!(sql.contains("ORDER BY \"created_at\" DESC, \"id\" DESC"));
    assert!(!sql.contains("OFFSET"));
    assert_eq!(list.pagination, Some(Pagination::Keyset { ascending: false }));
    assert!(list.returns_many);
}

#[test]
fn audit_table_insert_returns_public_id_on_postgres() {
    let bundle = generate(&users(), &CrudOptions::default(), &[Dialect::Postgres]).unwrap();
    let insert = bundle.statement(CrudKind::Insert).unwrap();
    assert!(insert.sql[&Dialect::Postgres]
        .text
        .ends_with("RETURNING \"public_id\""));
}

#[test]
fn mysql_insert_has_no_returning() {
    let bundle = generate(&users(), &CrudOptions::default(), &[Dialect::MySql]).unwrap();
    let insert = bundle.statement(CrudKind::Insert).unwrap();
    assert!(!insert.sql[&Dialect::MySql].text.contains("RETURNING"));
}

#[test]
fn table_without_keyset_columns_uses_offset_on_primary_key() {
    let bundle = generate(&counters(), &CrudOptions::default(), &Dialect::ALL).unwrap();
    let list = bundle.statement(CrudKind::List).unwrap();
    for dialect in Dialect::ALL {
        let sql = &list.sql[&dialect].text;
        assert!(sql.contains("OFFSET"), "{dialect}: {sql}");
        let order = format!("ORDER BY {} DESC", dialect.quote_identifier("id"));
        assert!(sql.contains(&order), "{dialect}: {sql}");
    }
}

#[test]
fn offset_fallback_prefers_creation_time() {
    let table = TableBuilder::new("events")
        .column(bigint("id").primary_key().auto_increment())
        .column(datetime("created_at").not_null())
        .column(text("payload"))
        .build(&Schema::default())
        .unwrap();
    let bundle = generate(&table, &CrudOptions::default(), &[Dialect::Sqlite]).unwrap();
    let sql = &bundle.statement(CrudKind::List).unwrap().sql[&Dialect::Sqlite].text;
    assert!(sql.ends_with("ORDER BY \"created_at\" DESC LIMIT ? OFFSET ?"));
}

// =============================================================================
// Scope enforcement
// =============================================================================

const SCOPED_KINDS: [CrudKind; 4] = [
    CrudKind::Get,
    CrudKind::List,
    CrudKind::Insert,
    CrudKind::Update,
];

#[test]
fn scope_column_appears_in_every_statement() {
    let options = CrudOptions {
        scope_column: Some("account_id".into()),
        ascending: false,
    };
    for table in [users(), counters_with_account()] {
        let bundle = generate(&table, &options, &Dialect::ALL).unwrap();
        for kind in SCOPED_KINDS {
            let statement = bundle.statement(kind).unwrap();
            for (dialect, bound) in &statement.sql {
                let quoted = dialect.quote_identifier("account_id");
                assert!(
                    bound.text.contains(&quoted),
                    "{} {kind} on {dialect}: {}",
                    table.name,
                    bound.text
                );
            }
        }
    }
}

#[test]
fn no_scope_means_no_scope_predicate() {
    let bundle = generate(&users(), &CrudOptions::default(), &Dialect::ALL).unwrap();
    for kind in [CrudKind::Get, CrudKind::List, CrudKind::Update] {
        let statement = bundle.statement(kind).unwrap();
        for (dialect, bound) in &statement.sql {
            // account_id is still an ordinary column in the select and set lists
            let predicates = bound.text.split(" WHERE ").nth(1).unwrap_or_default();
            let quoted = dialect.quote_identifier("account_id");
            assert!(!predicates.contains(&quoted), "{kind} on {dialect}");
        }
    }
}

fn counters_with_account() -> Table {
    TableBuilder::new("counters")
        .column(integer("id").primary_key().auto_increment())
        .column(bigint("account_id").not_null())
        .column(bigint("value").not_null().default_int(0))
        .build(&Schema::default())
        .unwrap()
}

#[test]
fn bundle_serializes_to_json() {
    let bundle = generate(&users(), &CrudOptions::default(), &Dialect::ALL).unwrap();
    let json = serde_json::to_value(&bundle).unwrap();
    assert_eq!(json["row"]["name"], "UserRow");
    assert_eq!(json["operations"][1]["kind"], "list");
    assert_eq!(json["operations"][1]["params"]["name"], "ListUsersParams");
    assert!(json["operations"][0]["sql"]["postgres"]["text"].is_string());
}

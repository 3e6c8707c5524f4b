// crates/shadow-alter-core/tests/schema.rs
// ============================================================================
// Module: Schema and Table Tests
// Description: Schema validation, alter derivation, literals, and merging.
// ============================================================================
//! ## Overview
//! Covers the table definition surface the coordinator builds on: which
//! schemas are valid, how alter requests derive a target schema, how literals
//! parse, and how each keys model merges rows on read.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use shadow_alter_core::AggregationType;
use shadow_alter_core::AlterOp;
use shadow_alter_core::AlterTableRequest;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnType;
use shadow_alter_core::KeysModel;
use shadow_alter_core::LocalTables;
use shadow_alter_core::SchemaError;
use shadow_alter_core::SchemaVersion;
use shadow_alter_core::TableError;
use shadow_alter_core::TableSchema;
use shadow_alter_core::Value;
use shadow_alter_core::ValueError;
use shadow_alter_core::parse_literal;

use crate::common::rows;
use crate::common::schema;
use crate::common::table_id;
use crate::common::varchar;

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn validate_rejects_float_and_string_keys() {
    let float_key = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Double), ColumnDef::value("v", ColumnType::Int)],
    );
    assert_eq!(float_key.validate(), Err(SchemaError::FloatKey));

    let string_key = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::String), ColumnDef::value("v", ColumnType::Int)],
    );
    assert_eq!(
        string_key.validate().expect_err("string key").to_string(),
        "String Type should not be used in key column[k]."
    );
}

#[test]
fn validate_enforces_key_prefix_and_aggregation_rules() {
    let late_key = schema(
        KeysModel::Duplicate,
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Int),
            ColumnDef::key("j", ColumnType::Int),
        ],
    );
    assert_eq!(late_key.validate(), Err(SchemaError::KeyNotPrefix("j".to_string())));

    let bare_value = schema(
        KeysModel::Aggregate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::Int)],
    );
    assert_eq!(bare_value.validate(), Err(SchemaError::MissingAggregation("v".to_string())));

    let summed_duplicate = schema(
        KeysModel::Duplicate,
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Int).with_aggregation(AggregationType::Sum),
        ],
    );
    assert_eq!(
        summed_duplicate.validate(),
        Err(SchemaError::UnexpectedAggregation("v".to_string()))
    );
}

#[test]
fn validate_rejects_duplicate_names_case_insensitively() {
    let table = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("K", ColumnType::Int)],
    );
    assert_eq!(table.validate(), Err(SchemaError::DuplicateColumn("K".to_string())));
}

// ============================================================================
// SECTION: Alter Derivation
// ============================================================================

fn base() -> TableSchema {
    schema(
        KeysModel::Duplicate,
        vec![
            ColumnDef::key("k1", ColumnType::Int),
            ColumnDef::key("k2", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Int),
        ],
    )
}

fn request(ops: Vec<AlterOp>) -> AlterTableRequest {
    AlterTableRequest {
        table_id: table_id(),
        ops,
    }
}

#[test]
fn apply_alter_places_added_keys_after_existing_keys() {
    let (target, touched) = base()
        .apply_alter(&request(vec![
            AlterOp::AddColumn {
                column: ColumnDef::key("k3", ColumnType::SmallInt),
                after: None,
            },
            AlterOp::AddColumn {
                column: ColumnDef::value("w", varchar(4)),
                after: None,
            },
        ]))
        .expect("alter");
    let names: Vec<&str> = target.columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["k1", "k2", "k3", "v", "w"]);
    assert_eq!(touched, vec!["k3".to_string(), "w".to_string()]);
    assert_eq!(target.version, SchemaVersion::INITIAL.next());
    target.validate().expect("valid target");
}

#[test]
fn apply_alter_rejects_invalid_operations() {
    let table = base();
    let cases = [
        (
            vec![AlterOp::DropColumn {
                name: "k1".to_string(),
            }],
            "Can not drop key column[k1]",
        ),
        (
            vec![AlterOp::ModifyColumn(ColumnDef::value("missing", ColumnType::Int))],
            "Column[missing] does not exist",
        ),
        (
            vec![AlterOp::AddColumn {
                column: ColumnDef::value("n", ColumnType::Int).with_nullable(false),
                after: None,
            }],
            "Can not add not null column[n] without default value",
        ),
        (
            vec![
                AlterOp::ModifyColumn(ColumnDef::value("v", ColumnType::BigInt)),
                AlterOp::DropColumn {
                    name: "V".to_string(),
                },
            ],
            "Column[V] is altered more than once",
        ),
        (vec![], "alter request has no operations"),
    ];
    for (ops, message) in cases {
        let err = table.apply_alter(&request(ops)).expect_err(message);
        assert_eq!(err.to_string(), message);
    }
}

// ============================================================================
// SECTION: Literals
// ============================================================================

#[test]
fn decimal_literals_round_half_up_and_check_precision() {
    let column_type = ColumnType::Decimal {
        precision: 5,
        scale: 2,
    };
    let rounded = parse_literal("1.005", &column_type).expect("decimal");
    assert_eq!(rounded.render(&column_type).as_deref(), Some("1.01"));
    assert!(matches!(
        parse_literal("1234.5", &column_type),
        Err(ValueError::OutOfRange { .. })
    ));
}

#[test]
fn text_literals_check_byte_length() {
    assert_eq!(
        parse_literal("ab", &varchar(2)).expect("fits"),
        Value::Text("ab".into())
    );
    let err = parse_literal("abc", &varchar(2)).expect_err("too long");
    assert_eq!(err.to_string(), "text of length 3 exceeds varchar(2)");
    assert_eq!(parse_literal("null", &ColumnType::Int).expect("null"), Value::Null);
}

// ============================================================================
// SECTION: Read Merging
// ============================================================================

#[test]
fn aggregate_model_folds_rows_on_read() {
    let table = schema(
        KeysModel::Aggregate,
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("total", ColumnType::BigInt).with_aggregation(AggregationType::Sum),
            ColumnDef::value("peak", ColumnType::Int).with_aggregation(AggregationType::Max),
            ColumnDef::value("last", varchar(8)).with_aggregation(AggregationType::ReplaceIfNotNull),
        ],
    );
    let tables = LocalTables::new();
    tables.create_table(table, 1).expect("create table");
    tables.insert(table_id(), &rows(&[&["1", "5", "3", "a"], &["2", "1", "1", "x"]])).expect("insert");
    tables.insert(table_id(), &rows(&[&["1", "7", "9", "NULL"]])).expect("insert");
    tables.insert(table_id(), &rows(&[&["1", "1", "2", "b"]])).expect("insert");

    assert_eq!(
        tables.read_text(table_id()).expect("read"),
        rows(&[&["1", "13", "9", "b"], &["2", "1", "1", "x"]])
    );
}

#[test]
fn unique_model_keeps_latest_row() {
    let table = schema(
        KeysModel::Unique,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", varchar(8))],
    );
    let tables = LocalTables::new();
    tables.create_table(table, 2).expect("create table");
    tables.insert(table_id(), &rows(&[&["1", "old"], &["2", "two"]])).expect("insert");
    tables.insert(table_id(), &rows(&[&["1", "new"]])).expect("insert");
    assert_eq!(
        tables.read_text(table_id()).expect("read"),
        rows(&[&["1", "new"], &["2", "two"]])
    );
}

#[test]
fn insert_rejects_rows_that_do_not_fit() {
    let tables = LocalTables::new();
    tables.create_table(base(), 1).expect("create table");
    let err = tables.insert(table_id(), &rows(&[&["1", "2"]])).expect_err("arity");
    assert!(matches!(err, TableError::Arity { .. }));
    let err = tables.insert(table_id(), &rows(&[&["1", "2", "x"]])).expect_err("literal");
    assert!(err.to_string().contains("invalid literal 'x' for type int"), "{err}");
    assert!(tables.read_text(table_id()).expect("read").is_empty());
}

// crates/shadow-alter-core/tests/convert.rs
// ============================================================================
// Module: Conversion Executor Tests
// Description: Row conversion, column fill, and deterministic encoding.
// Purpose: Ensure compiled plans convert rows exactly and repeatably.
// ============================================================================

//! Conversion executor tests.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use shadow_alter_core::AlterOp;
use shadow_alter_core::AlterTableRequest;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnType;
use shadow_alter_core::ConversionError;
use shadow_alter_core::ConversionKind;
use shadow_alter_core::ConversionPlan;
use shadow_alter_core::KeysModel;
use shadow_alter_core::RewriteKind;
use shadow_alter_core::RewritePlan;
use shadow_alter_core::TableSchema;
use shadow_alter_core::Value;
use shadow_alter_core::encode_row;
use shadow_alter_core::matrix::plan_alter;
use shadow_alter_core::parse_literal;

use crate::common::schema;
use crate::common::table_id;
use crate::common::varchar;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn compile(origin: &TableSchema, request: &AlterTableRequest) -> ConversionPlan {
    let (target, _) = origin.apply_alter(request).expect("apply alter");
    target.validate().expect("target schema");
    let rewrites = plan_alter(origin, &target).expect("allowed change");
    ConversionPlan::compile(origin, &target, &rewrites).expect("compile")
}

fn literal(text: &str, column_type: ColumnType) -> Value {
    parse_literal(text, &column_type).expect("literal")
}

fn largeint_table() -> TableSchema {
    schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::LargeInt), ColumnDef::value("v", ColumnType::Int)],
    )
}

fn key_to_varchar() -> AlterTableRequest {
    AlterTableRequest {
        table_id: table_id(),
        ops: vec![AlterOp::ModifyColumn(ColumnDef::key("k", varchar(100)))],
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Tests LARGEINT keys are rendered as decimal text.
#[test]
fn test_largeint_renders_as_decimal_text() {
    let plan = compile(&largeint_table(), &key_to_varchar());
    let row = vec![
        literal("-170141183460469231731687303715884105728", ColumnType::LargeInt),
        Value::Int(7),
    ];
    let converted = plan.convert_row(&row).expect("convert");
    assert_eq!(converted[0], Value::Text(Arc::from("-170141183460469231731687303715884105728")));
    assert_eq!(converted[1], Value::Int(7));
}

/// Tests integer widening and NULL pass-through.
#[test]
fn test_integer_widening_keeps_nulls() {
    let origin = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::SmallInt)],
    );
    let request = AlterTableRequest {
        table_id: table_id(),
        ops: vec![AlterOp::ModifyColumn(ColumnDef::value("v", ColumnType::BigInt))],
    };
    let plan = compile(&origin, &request);
    assert_eq!(
        plan.convert_row(&[Value::Int(1), Value::SmallInt(-3)]).expect("widen"),
        vec![Value::Int(1), Value::BigInt(-3)]
    );
    assert_eq!(
        plan.convert_row(&[Value::Int(2), Value::Null]).expect("null"),
        vec![Value::Int(2), Value::Null]
    );
}

/// Tests added columns materialize their default and dropped columns vanish.
#[test]
fn test_add_and_drop_columns() {
    let origin = schema(
        KeysModel::Duplicate,
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("old", ColumnType::Int),
            ColumnDef::value("keep", varchar(8)),
        ],
    );
    let request = AlterTableRequest {
        table_id: table_id(),
        ops: vec![
            AlterOp::DropColumn {
                name: "old".to_string(),
            },
            AlterOp::AddColumn {
                column: ColumnDef::value("flag", ColumnType::Boolean)
                    .with_nullable(false)
                    .with_default("true"),
                after: Some("k".to_string()),
            },
            AlterOp::AddColumn {
                column: ColumnDef::value("note", ColumnType::String),
                after: None,
            },
        ],
    };
    let plan = compile(&origin, &request);
    let converted = plan
        .convert_row(&[Value::Int(1), Value::Int(9), Value::Text(Arc::from("x"))])
        .expect("convert");
    assert_eq!(
        converted,
        vec![Value::Int(1), Value::Boolean(true), Value::Text(Arc::from("x")), Value::Null]
    );
}

/// Tests DATETIMEV2 values render with their declared scale.
#[test]
fn test_datetime_renders_with_scale() {
    let column_type = ColumnType::DateTimeV2 {
        scale: 3,
    };
    let origin = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("at", column_type)],
    );
    let request = AlterTableRequest {
        table_id: table_id(),
        ops: vec![AlterOp::ModifyColumn(ColumnDef::value("at", ColumnType::String))],
    };
    let plan = compile(&origin, &request);
    let row = vec![Value::Int(1), literal("2024-01-02 03:04:05.123", column_type)];
    let converted = plan.convert_row(&row).expect("convert");
    assert_eq!(converted[1], Value::Text(Arc::from("2024-01-02 03:04:05.123")));
}

/// Tests NULL reaching a NOT NULL target column is rejected.
#[test]
fn test_null_into_not_null_column_fails() {
    let origin = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::Int)],
    );
    let mut target = origin.clone();
    target.columns[1].nullable = false;
    let plans = BTreeMap::from([
        (
            "k".to_string(),
            RewritePlan {
                kind: RewriteKind::Unchanged,
                conversion: ConversionKind::Identity,
                default: None,
            },
        ),
        (
            "v".to_string(),
            RewritePlan {
                kind: RewriteKind::Unchanged,
                conversion: ConversionKind::Identity,
                default: None,
            },
        ),
    ]);
    let plan = ConversionPlan::compile(&origin, &target, &plans).expect("compile");
    let err = plan.convert_row(&[Value::Int(1), Value::Null]).expect_err("null violation");
    assert_eq!(err, ConversionError::NullViolation("v".to_string()));
}

/// Tests rows of the wrong width are rejected.
#[test]
fn test_arity_mismatch_fails() {
    let plan = compile(&largeint_table(), &key_to_varchar());
    let err = plan.convert_row(&[Value::LargeInt(1)]).expect_err("arity");
    assert_eq!(
        err,
        ConversionError::Arity {
            expected: 2,
            actual: 1,
        }
    );
}

// ============================================================================
// SECTION: Determinism
// ============================================================================

/// Tests converting the same row twice yields identical bytes.
#[test]
fn test_conversion_is_byte_identical_across_runs() {
    let plan = compile(&largeint_table(), &key_to_varchar());
    let row = vec![Value::LargeInt(123_456_789), Value::Null];
    let first = encode_row(&plan.convert_row(&row).expect("first"));
    let second = encode_row(&plan.convert_row(&row).expect("second"));
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn test_bigint_text_round_trips(value in any::<i64>()) {
        let origin = schema(
            KeysModel::Duplicate,
            vec![ColumnDef::key("k", ColumnType::BigInt), ColumnDef::value("v", ColumnType::Int)],
        );
        let request = AlterTableRequest {
            table_id: table_id(),
            ops: vec![AlterOp::ModifyColumn(ColumnDef::key("k", varchar(20)))],
        };
        let plan = compile(&origin, &request);
        let converted = plan.convert_row(&[Value::BigInt(value), Value::Null]).unwrap();
        prop_assert_eq!(&converted[0], &Value::Text(Arc::from(value.to_string())));
        let reparsed = parse_literal(&value.to_string(), &ColumnType::BigInt).unwrap();
        prop_assert_eq!(reparsed, Value::BigInt(value));
    }

    #[test]
    fn test_widening_preserves_value(value in any::<i32>()) {
        let origin = schema(
            KeysModel::Duplicate,
            vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::Int)],
        );
        let request = AlterTableRequest {
            table_id: table_id(),
            ops: vec![AlterOp::ModifyColumn(ColumnDef::key("k", ColumnType::LargeInt))],
        };
        let plan = compile(&origin, &request);
        let converted = plan.convert_row(&[Value::Int(value), Value::Int(value)]).unwrap();
        prop_assert_eq!(&converted[0], &Value::LargeInt(i128::from(value)));
        prop_assert_eq!(encode_row(&converted), encode_row(&plan.convert_row(&[Value::Int(value), Value::Int(value)]).unwrap()));
    }
}

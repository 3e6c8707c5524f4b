// crates/shadow-alter-core/tests/aggregate.rs
// ============================================================================
// Module: Read Merging Tests
// Description: Row merging per keys model and aggregation folding.
// Purpose: Validate the read semantics shared by originals and shadows.
// ============================================================================

//! Read merging tests.

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

use shadow_alter_core::AggregationType;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnType;
use shadow_alter_core::KeysModel;
use shadow_alter_core::StorageVersion;
use shadow_alter_core::TableSchema;
use shadow_alter_core::Value;
use shadow_alter_core::ValueError;
use shadow_alter_core::VersionedRow;
use shadow_alter_core::merge_rows;

use crate::common::schema;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn aggregate_table(aggregation: AggregationType, value_type: ColumnType) -> TableSchema {
    schema(
        KeysModel::Aggregate,
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", value_type).with_aggregation(aggregation),
        ],
    )
}

fn load(version: u64, key: i32, value: Value) -> VersionedRow {
    VersionedRow {
        version: StorageVersion::new(version),
        row: vec![Value::Int(key), value],
    }
}

fn folded(aggregation: AggregationType, rows: Vec<VersionedRow>) -> Vec<Vec<Value>> {
    merge_rows(&aggregate_table(aggregation, ColumnType::Int), rows).expect("merge")
}

// ============================================================================
// SECTION: Keys Models
// ============================================================================

/// Tests duplicate tables keep every row in key order.
#[test]
fn test_duplicate_rows_are_kept() {
    let table = schema(
        KeysModel::Duplicate,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::Int)],
    );
    let merged = merge_rows(
        &table,
        vec![load(2, 2, Value::Int(1)), load(1, 1, Value::Int(5)), load(3, 1, Value::Int(6))],
    )
    .expect("merge");
    assert_eq!(
        merged,
        vec![
            vec![Value::Int(1), Value::Int(5)],
            vec![Value::Int(1), Value::Int(6)],
            vec![Value::Int(2), Value::Int(1)],
        ]
    );
}

/// Tests unique tables keep the row of the latest version.
#[test]
fn test_unique_rows_keep_latest_version() {
    let table = schema(
        KeysModel::Unique,
        vec![ColumnDef::key("k", ColumnType::Int), ColumnDef::value("v", ColumnType::Int)],
    );
    let merged = merge_rows(
        &table,
        vec![load(3, 1, Value::Null), load(1, 1, Value::Int(5)), load(2, 1, Value::Int(6))],
    )
    .expect("merge");
    assert_eq!(merged, vec![vec![Value::Int(1), Value::Null]]);
}

// ============================================================================
// SECTION: Aggregations
// ============================================================================

/// Tests SUM adds across versions and skips NULL.
#[test]
fn test_sum_folds_across_versions() {
    let merged = folded(
        AggregationType::Sum,
        vec![load(1, 1, Value::Int(10)), load(2, 1, Value::Null), load(3, 1, Value::Int(-3))],
    );
    assert_eq!(merged, vec![vec![Value::Int(1), Value::Int(7)]]);
}

/// Tests SUM overflow is reported instead of wrapping.
#[test]
fn test_sum_overflow_is_an_error() {
    let rows = vec![load(1, 1, Value::Int(i32::MAX)), load(2, 1, Value::Int(1))];
    let err = merge_rows(&aggregate_table(AggregationType::Sum, ColumnType::Int), rows)
        .expect_err("overflow");
    assert_eq!(err, ValueError::Overflow);
}

/// Tests MIN and MAX ignore NULL and keep the extreme value.
#[test]
fn test_min_and_max_ignore_null() {
    let rows = || {
        vec![
            load(1, 1, Value::Null),
            load(2, 1, Value::Int(4)),
            load(3, 1, Value::Int(-2)),
            load(4, 1, Value::Null),
            load(5, 1, Value::Int(9)),
        ]
    };
    assert_eq!(folded(AggregationType::Min, rows()), vec![vec![Value::Int(1), Value::Int(-2)]]);
    assert_eq!(folded(AggregationType::Max, rows()), vec![vec![Value::Int(1), Value::Int(9)]]);
}

/// Tests REPLACE takes the latest value even when NULL.
#[test]
fn test_replace_takes_latest_value() {
    let merged = folded(
        AggregationType::Replace,
        vec![load(2, 1, Value::Null), load(1, 1, Value::Int(3))],
    );
    assert_eq!(merged, vec![vec![Value::Int(1), Value::Null]]);
}

/// Tests REPLACE_IF_NOT_NULL keeps the latest non-null value.
#[test]
fn test_replace_if_not_null_skips_null() {
    let merged = folded(
        AggregationType::ReplaceIfNotNull,
        vec![load(3, 1, Value::Null), load(1, 1, Value::Int(3)), load(2, 1, Value::Int(8))],
    );
    assert_eq!(merged, vec![vec![Value::Int(1), Value::Int(8)]]);
}

/// Tests folding follows version order rather than input order.
#[test]
fn test_folding_uses_version_order() {
    let forward = folded(
        AggregationType::Replace,
        vec![load(1, 1, Value::Int(1)), load(2, 1, Value::Int(2))],
    );
    let backward = folded(
        AggregationType::Replace,
        vec![load(2, 1, Value::Int(2)), load(1, 1, Value::Int(1))],
    );
    assert_eq!(forward, backward);
    assert_eq!(forward, vec![vec![Value::Int(1), Value::Int(2)]]);
}

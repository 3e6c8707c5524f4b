// crates/shadow-alter-core/tests/matrix.rs
// ============================================================================
// Module: Type Compatibility Matrix Tests
// Description: Exhaustive and targeted checks of column change verdicts.
// Purpose: Pin allow/deny outcomes and the exact rejection messages.
// ============================================================================

//! Type compatibility matrix tests.

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

use shadow_alter_core::AggregationType;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnRole;
use shadow_alter_core::ColumnType;
use shadow_alter_core::ConversionKind;
use shadow_alter_core::DenyKind;
use shadow_alter_core::RewriteKind;
use shadow_alter_core::TypeCategory;
use shadow_alter_core::Value;
use shadow_alter_core::Verdict;
use shadow_alter_core::matrix::check;
use shadow_alter_core::matrix::verdict;
use shadow_alter_core::types::representative;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn column(role: ColumnRole, column_type: ColumnType) -> ColumnDef {
    match role {
        ColumnRole::Key => ColumnDef::key("c", column_type),
        ColumnRole::Value => ColumnDef::value("c", column_type),
    }
}

fn message(source: &ColumnDef, target: &ColumnDef) -> String {
    check(source, target).expect_err("change should be denied").to_string()
}

// ============================================================================
// SECTION: Properties
// ============================================================================

/// Tests every (source, target, role) triple yields a stable verdict and a
/// non-empty reason when denied.
#[test]
fn test_matrix_is_exhaustive_and_deterministic() {
    for source in TypeCategory::ALL {
        for target in TypeCategory::ALL {
            for role in ColumnRole::ALL {
                let first = verdict(source, target, role);
                assert_eq!(first, verdict(source, target, role));
                if role == ColumnRole::Key {
                    match target {
                        TypeCategory::Float | TypeCategory::Double => {
                            assert_eq!(first, Verdict::Deny(DenyKind::FloatKey));
                        }
                        TypeCategory::String => {
                            assert_eq!(first, Verdict::Deny(DenyKind::StringKey));
                        }
                        _ => {}
                    }
                }
                let result = check(
                    &column(role, representative(source)),
                    &column(role, representative(target)),
                );
                if let Verdict::Deny(_) = first {
                    assert!(result.is_err(), "{source:?} -> {target:?} ({role}) allowed");
                }
                if let Err(err) = result {
                    assert!(!err.to_string().is_empty());
                }
            }
        }
    }
}

/// Tests FLOAT and DOUBLE key targets are denied from every source type.
#[test]
fn test_float_key_targets_are_denied_from_every_source() {
    for source in TypeCategory::ALL {
        for target in [ColumnType::Float, ColumnType::Double] {
            let err = check(
                &ColumnDef::key("k", representative(source)),
                &ColumnDef::key("k", target),
            )
            .expect_err("float key");
            assert_eq!(err.kind, DenyKind::FloatKey);
            assert_eq!(
                err.to_string(),
                "Float or double can not used as a key, use decimal instead."
            );
        }
    }
}

/// Tests STRING key targets are denied from every source type.
#[test]
fn test_string_key_targets_are_denied_from_every_source() {
    for source in TypeCategory::ALL {
        let err = check(
            &ColumnDef::key("k", representative(source)),
            &ColumnDef::key("k", ColumnType::String),
        )
        .expect_err("string key");
        assert_eq!(err.kind, DenyKind::StringKey);
        assert_eq!(err.to_string(), "String Type should not be used in key column[k].");
    }
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Tests DECIMAL(38,10) to BOOLEAN uses the physical decimal label.
#[test]
fn test_decimal_to_boolean_message() {
    let source = ColumnDef::key(
        "k",
        ColumnType::Decimal {
            precision: 38,
            scale: 10,
        },
    );
    let target = ColumnDef::key("k", ColumnType::Boolean);
    assert_eq!(message(&source, &target), "Can not change DECIMAL128 to BOOLEAN");
}

/// Tests text narrowing renders lowercase type names.
#[test]
fn test_varchar_narrowing_message() {
    let source = ColumnDef::key(
        "k",
        ColumnType::Varchar {
            length: 100,
        },
    );
    let target = ColumnDef::key(
        "k",
        ColumnType::Varchar {
            length: 2,
        },
    );
    assert_eq!(
        message(&source, &target),
        "Can not change from wider type varchar to narrower type varchar(2)"
    );
}

/// Tests integer narrowing is denied for keys and values.
#[test]
fn test_integer_narrowing_is_denied() {
    for role in ColumnRole::ALL {
        let err = check(&column(role, ColumnType::LargeInt), &column(role, ColumnType::Int))
            .expect_err("narrowing");
        assert_eq!(err.kind, DenyKind::Narrowing);
        assert_eq!(err.to_string(), "Cannot change LARGEINT to INT");
    }
}

/// Tests integer rendering into a column narrower than its widest value.
#[test]
fn test_integer_to_short_varchar_is_text_narrowing() {
    let source = ColumnDef::value("v", ColumnType::LargeInt);
    let target = ColumnDef::value(
        "v",
        ColumnType::Varchar {
            length: 39,
        },
    );
    assert_eq!(
        message(&source, &target),
        "Can not change from wider type largeint to narrower type varchar(39)"
    );
}

/// Tests the role, nullability, and aggregation rules.
#[test]
fn test_structural_changes_are_denied() {
    let key = ColumnDef::key("k", ColumnType::Int);
    assert_eq!(
        message(&key, &ColumnDef::value("k", ColumnType::Int)),
        "Can not change key column[k] to value column"
    );

    let nullable = ColumnDef::value("v", ColumnType::Int);
    assert_eq!(
        message(&nullable, &nullable.clone().with_nullable(false)),
        "Can not change from nullable to non-nullable"
    );

    let summed = ColumnDef::value("v", ColumnType::Int).with_aggregation(AggregationType::Sum);
    assert_eq!(
        message(&summed, &summed.clone().with_aggregation(AggregationType::Max)),
        "Can not change aggregation type"
    );
}

/// Tests text to numeric conversions check the default before the type.
#[test]
fn test_text_to_numeric_reports_default_first() {
    let source = ColumnDef::value(
        "v",
        ColumnType::Varchar {
            length: 10,
        },
    );
    assert_eq!(
        message(&source, &ColumnDef::value("v", ColumnType::Int).with_default("abc")),
        "Can not change default value"
    );
    assert_eq!(
        message(&source, &ColumnDef::value("v", ColumnType::Int)),
        "Can not change VARCHAR to INT"
    );
}

/// Tests aggregated value columns may not be rendered as text.
#[test]
fn test_sum_column_to_text_is_denied() {
    let source = ColumnDef::value("v", ColumnType::Int).with_aggregation(AggregationType::Sum);
    let target = ColumnDef::value("v", ColumnType::String).with_aggregation(AggregationType::Sum);
    assert_eq!(message(&source, &target), "Can not change INT to STRING");
}

/// Tests an unparseable default on an allowed change is rejected.
#[test]
fn test_invalid_default_on_allowed_change() {
    let source = ColumnDef::value("v", ColumnType::Int);
    let target = ColumnDef::value("v", ColumnType::BigInt).with_default("1.5");
    assert_eq!(message(&source, &target), "Can not change default value");
}

// ============================================================================
// SECTION: Plans
// ============================================================================

/// Tests allowed changes carry the expected rewrite kind and conversion.
#[test]
fn test_allowed_changes_produce_plans() {
    let widen = check(
        &ColumnDef::key("k", ColumnType::Int),
        &ColumnDef::key("k", ColumnType::BigInt),
    )
    .expect("int widening");
    assert_eq!(widen.kind, RewriteKind::Reinterpret);
    assert_eq!(widen.conversion, ConversionKind::IntegerWiden);

    let render = check(
        &ColumnDef::key("k", ColumnType::LargeInt),
        &ColumnDef::key(
            "k",
            ColumnType::Varchar {
                length: 100,
            },
        ),
    )
    .expect("largeint to varchar");
    assert_eq!(render.kind, RewriteKind::Rewrite);
    assert_eq!(render.conversion, ConversionKind::ToText);

    let same = check(
        &ColumnDef::value("v", ColumnType::Date),
        &ColumnDef::value("v", ColumnType::Date).with_default("2024-01-31"),
    )
    .expect("default change");
    assert_eq!(same.kind, RewriteKind::Unchanged);
    assert_eq!(same.conversion, ConversionKind::Identity);
    assert!(matches!(same.default, Some(Value::Date(_))));
}

/// Tests decimal widening requires both integer digits and scale to grow.
#[test]
fn test_decimal_rescale_guard() {
    let source = ColumnDef::value(
        "v",
        ColumnType::Decimal {
            precision: 10,
            scale: 2,
        },
    );
    let wider = ColumnDef::value(
        "v",
        ColumnType::Decimal {
            precision: 20,
            scale: 4,
        },
    );
    assert_eq!(check(&source, &wider).expect("widen").conversion, ConversionKind::DecimalRescale);

    let less_scale = ColumnDef::value(
        "v",
        ColumnType::Decimal {
            precision: 20,
            scale: 1,
        },
    );
    assert_eq!(check(&source, &less_scale).expect_err("narrow scale").kind, DenyKind::Narrowing);
}

/// Tests integer to decimal needs room for every integer digit.
#[test]
fn test_integer_to_decimal_digits_guard() {
    let source = ColumnDef::value("v", ColumnType::Int);
    let fits = ColumnDef::value(
        "v",
        ColumnType::Decimal {
            precision: 12,
            scale: 2,
        },
    );
    let short = ColumnDef::value(
        "v",
        ColumnType::Decimal {
            precision: 9,
            scale: 0,
        },
    );
    assert!(check(&source, &fits).is_ok());
    assert_eq!(check(&source, &short).expect_err("too few digits").kind, DenyKind::Narrowing);
}

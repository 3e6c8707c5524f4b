// crates/shadow-alter-core/src/runtime/convert.rs
// ============================================================================
// Module: Conversion Executor
// Description: Compiled per-table row conversion from origin to target layout.
// Purpose: Transform rows deterministically for backfill and replay.
// Dependencies: crate::core, crate::runtime::matrix, bigdecimal, thiserror
// ============================================================================

//! ## Overview
//! A [`ConversionPlan`] is compiled once per job from the origin schema, the
//! target schema, and the matrix rewrite plans. Converting a row is a pure
//! function of the plan and the row; backfill and replay share the plan, so
//! the same input row always yields byte-identical output.
//!
//! Unchanged columns are cloned, which shares text and decimal payloads with
//! the original row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use thiserror::Error;
use time::PrimitiveDateTime;
use time::Time;

use crate::core::schema::TableSchema;
use crate::core::types::ColumnType;
use crate::core::value::Row;
use crate::core::value::Value;
use crate::core::value::ValueError;
use crate::core::value::check_text_length;
use crate::core::value::fit_decimal;
use crate::core::value::parse_literal;
use crate::core::value::truncate_subsecond;
use crate::runtime::matrix::ConversionKind;
use crate::runtime::matrix::RewriteKind;
use crate::runtime::matrix::RewritePlan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Row conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Row width does not match the origin schema.
    #[error("row has {actual} values but the schema has {expected} columns")]
    Arity {
        /// Origin column count.
        expected: usize,
        /// Row value count.
        actual: usize,
    },
    /// NULL reached a NOT NULL column.
    #[error("NULL value in NOT NULL column[{0}]")]
    NullViolation(String),
    /// Value could not be converted.
    #[error("column[{column}]: {source}")]
    Value {
        /// Target column name.
        column: String,
        /// Underlying value error.
        source: ValueError,
    },
    /// Value kind does not match the planned conversion.
    #[error("column[{column}]: {kind} value does not match the planned conversion")]
    Unsupported {
        /// Target column name.
        column: String,
        /// Value kind found.
        kind: &'static str,
    },
    /// Plan could not be compiled.
    #[error("invalid conversion plan: {0}")]
    Plan(String),
}

// ============================================================================
// SECTION: Plans
// ============================================================================

/// Per-column step of a compiled plan.
#[derive(Debug, Clone, PartialEq)]
enum ColumnStep {
    /// Carry the origin value over.
    Copy {
        /// Origin column position.
        source: usize,
    },
    /// Convert the origin value.
    Convert {
        /// Origin column position.
        source: usize,
        /// Conversion to apply.
        kind: ConversionKind,
        /// Origin column type.
        source_type: ColumnType,
    },
    /// Materialize a constant for an added column.
    Fill {
        /// Default value or NULL.
        value: Value,
    },
}

/// Compiled row conversion for one job.
///
/// # Invariants
/// - `steps` has one entry per target column, in target order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    /// Origin column count.
    origin_width: usize,
    /// Target schema the rows are produced for.
    target: TableSchema,
    /// Per-target-column steps.
    steps: Vec<ColumnStep>,
}

impl ConversionPlan {
    /// Compiles a plan.
    ///
    /// `plans` holds the matrix verdicts keyed by lowercase column name for
    /// every column present in both schemas.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Plan`] when a shared column has no plan or
    /// an added NOT NULL column has no default.
    pub fn compile(
        origin: &TableSchema,
        target: &TableSchema,
        plans: &BTreeMap<String, RewritePlan>,
    ) -> Result<Self, ConversionError> {
        let mut steps = Vec::with_capacity(target.columns.len());
        for column in &target.columns {
            let step = if let Some((source, source_column)) = origin.column(&column.name) {
                let plan = plans.get(&column.name.to_ascii_lowercase()).ok_or_else(|| {
                    ConversionError::Plan(format!("no rewrite plan for column[{}]", column.name))
                })?;
                if plan.kind == RewriteKind::Unchanged {
                    ColumnStep::Copy {
                        source,
                    }
                } else {
                    ColumnStep::Convert {
                        source,
                        kind: plan.conversion,
                        source_type: source_column.column_type,
                    }
                }
            } else {
                let value = match &column.default_value {
                    Some(literal) => parse_literal(literal, &column.column_type).map_err(
                        |source| ConversionError::Value {
                            column: column.name.clone(),
                            source,
                        },
                    )?,
                    None if column.nullable => Value::Null,
                    None => {
                        return Err(ConversionError::Plan(format!(
                            "column[{}] is NOT NULL and has no default",
                            column.name
                        )));
                    }
                };
                ColumnStep::Fill {
                    value,
                }
            };
            steps.push(step);
        }
        Ok(Self {
            origin_width: origin.columns.len(),
            target: target.clone(),
            steps,
        })
    }

    /// Returns the target schema.
    #[must_use]
    pub const fn target(&self) -> &TableSchema {
        &self.target
    }

    /// Converts one origin row into the target layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the row width is wrong, a value cannot
    /// be converted, or NULL reaches a NOT NULL column.
    pub fn convert_row(&self, row: &[Value]) -> Result<Row, ConversionError> {
        if row.len() != self.origin_width {
            return Err(ConversionError::Arity {
                expected: self.origin_width,
                actual: row.len(),
            });
        }
        let mut out = Vec::with_capacity(self.steps.len());
        for (step, column) in self.steps.iter().zip(&self.target.columns) {
            let value = match step {
                ColumnStep::Copy {
                    source,
                } => row[*source].clone(),
                ColumnStep::Convert {
                    source,
                    kind,
                    source_type,
                } => convert_value(&row[*source], *kind, source_type, &column.column_type)
                    .map_err(|err| err.for_column(&column.name))?,
                ColumnStep::Fill {
                    value,
                } => value.clone(),
            };
            if value.is_null() && !column.nullable {
                return Err(ConversionError::NullViolation(column.name.clone()));
            }
            out.push(value);
        }
        Ok(out)
    }
}

// ============================================================================
// SECTION: Value Conversion
// ============================================================================

/// Value conversion failure before the column name is attached.
enum ValueFailure {
    /// Value error from range or length checks.
    Value(ValueError),
    /// Value kind not covered by the conversion.
    Unsupported(&'static str),
}

impl ValueFailure {
    /// Attaches the column name.
    fn for_column(self, column: &str) -> ConversionError {
        match self {
            Self::Value(source) => ConversionError::Value {
                column: column.to_string(),
                source,
            },
            Self::Unsupported(kind) => ConversionError::Unsupported {
                column: column.to_string(),
                kind,
            },
        }
    }
}

/// Converts one value. NULL always converts to NULL.
fn convert_value(
    value: &Value,
    kind: ConversionKind,
    source_type: &ColumnType,
    target_type: &ColumnType,
) -> Result<Value, ValueFailure> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let unsupported = || ValueFailure::Unsupported(value.kind());
    let out_of_range = || {
        ValueFailure::Value(ValueError::OutOfRange {
            value: value.render(source_type).unwrap_or_default(),
            type_name: target_type.sql(),
        })
    };
    match kind {
        ConversionKind::Identity => Ok(value.clone()),
        ConversionKind::IntegerWiden => {
            let wide = value.as_i128().ok_or_else(unsupported)?;
            match target_type {
                ColumnType::TinyInt => i8::try_from(wide).map(Value::TinyInt).map_err(|_| out_of_range()),
                ColumnType::SmallInt => {
                    i16::try_from(wide).map(Value::SmallInt).map_err(|_| out_of_range())
                }
                ColumnType::Int => i32::try_from(wide).map(Value::Int).map_err(|_| out_of_range()),
                ColumnType::BigInt => i64::try_from(wide).map(Value::BigInt).map_err(|_| out_of_range()),
                ColumnType::LargeInt => Ok(Value::LargeInt(wide)),
                _ => Err(unsupported()),
            }
        }
        ConversionKind::IntegerToDecimal => {
            let wide = value.as_i128().ok_or_else(unsupported)?;
            match *target_type {
                ColumnType::Decimal {
                    precision,
                    scale,
                } => fit_decimal(&BigDecimal::from(wide), precision, scale, target_type)
                    .map(Value::Decimal)
                    .map_err(ValueFailure::Value),
                _ => Err(unsupported()),
            }
        }
        ConversionKind::IntegerToFloat => {
            let exact = match *value {
                Value::TinyInt(small) => f64::from(small),
                Value::SmallInt(small) => f64::from(small),
                Value::Int(int) => f64::from(int),
                _ => return Err(unsupported()),
            };
            match target_type {
                ColumnType::Float => match *value {
                    Value::TinyInt(small) => Ok(Value::Float(f32::from(small))),
                    Value::SmallInt(small) => Ok(Value::Float(f32::from(small))),
                    _ => Err(unsupported()),
                },
                ColumnType::Double => Ok(Value::Double(exact)),
                _ => Err(unsupported()),
            }
        }
        ConversionKind::FloatToDouble => match *value {
            Value::Float(float) => Ok(Value::Double(f64::from(float))),
            _ => Err(unsupported()),
        },
        ConversionKind::DecimalRescale => match (value, *target_type) {
            (
                Value::Decimal(decimal),
                ColumnType::Decimal {
                    precision,
                    scale,
                },
            ) => fit_decimal(decimal, precision, scale, target_type)
                .map(Value::Decimal)
                .map_err(ValueFailure::Value),
            _ => Err(unsupported()),
        },
        ConversionKind::DateToDate => match value {
            Value::Date(date) => Ok(Value::Date(*date)),
            _ => Err(unsupported()),
        },
        ConversionKind::DateToDateTime => match value {
            Value::Date(date) => Ok(Value::DateTime(PrimitiveDateTime::new(*date, Time::MIDNIGHT))),
            _ => Err(unsupported()),
        },
        ConversionKind::DateTimeRescale => match value {
            Value::DateTime(datetime) => Ok(Value::DateTime(truncate_subsecond(
                *datetime,
                target_type.datetime_scale().unwrap_or(0),
            ))),
            _ => Err(unsupported()),
        },
        ConversionKind::ToText => {
            let text = value.render(source_type).ok_or_else(unsupported)?;
            into_text(&text, target_type)
        }
        ConversionKind::TextToText => match value {
            Value::Text(text) => into_text(text, target_type),
            _ => Err(unsupported()),
        },
    }
}

/// Copies text into fresh storage, checking the target length.
fn into_text(text: &str, target_type: &ColumnType) -> Result<Value, ValueFailure> {
    if let Some(length) = target_type.text_length() {
        check_text_length(text, length, target_type).map_err(ValueFailure::Value)?;
    }
    Ok(Value::Text(Arc::from(text)))
}

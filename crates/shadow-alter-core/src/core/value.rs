// crates/shadow-alter-core/src/core/value.rs
// ============================================================================
// Module: Shadow Alter Cell Values
// Description: Typed cell values, literal parsing, and canonical text rendering.
// Purpose: Give the executor and storage a single in-memory row representation.
// Dependencies: bigdecimal, thiserror, time
// ============================================================================

//! ## Overview
//! [`Value`] is one typed cell. Text and decimal payloads sit behind `Arc` so
//! that columns untouched by an alter are carried into the shadow by
//! reference. Literals (defaults and loaded rows) are parsed against a
//! [`ColumnType`]; [`Value::render`] produces the canonical text form used
//! by text-rendering conversions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use thiserror::Error;
use time::Date;
use time::PrimitiveDateTime;
use time::Time;
use time::macros::format_description;

use crate::core::identifiers::StorageVersion;
use crate::core::types::ColumnType;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Literal parsing and value arithmetic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Literal does not parse as the type.
    #[error("invalid literal '{literal}' for type {type_name}")]
    InvalidLiteral {
        /// Offending literal.
        literal: String,
        /// SQL form of the type.
        type_name: String,
    },
    /// Value does not fit the type's range or digits.
    #[error("value '{value}' is out of range for type {type_name}")]
    OutOfRange {
        /// Offending value text.
        value: String,
        /// SQL form of the type.
        type_name: String,
    },
    /// Text exceeds the declared length.
    #[error("text of length {length} exceeds {type_name}")]
    TooLong {
        /// Byte length of the text.
        length: usize,
        /// SQL form of the type.
        type_name: String,
    },
    /// Arithmetic overflow while aggregating.
    #[error("aggregation overflow")]
    Overflow,
    /// Values of different kinds were combined.
    #[error("mismatched value kinds: {0} and {1}")]
    Mismatch(&'static str, &'static str),
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// Typed cell value.
///
/// # Invariants
/// - DATE and DATEV2 columns hold `Date`; DATETIME and DATETIMEV2 hold `DateTime`.
/// - Decimal values carry exactly the column scale.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// BOOLEAN.
    Boolean(bool),
    /// TINYINT.
    TinyInt(i8),
    /// SMALLINT.
    SmallInt(i16),
    /// INT.
    Int(i32),
    /// BIGINT.
    BigInt(i64),
    /// LARGEINT.
    LargeInt(i128),
    /// FLOAT.
    Float(f32),
    /// DOUBLE.
    Double(f64),
    /// DECIMAL.
    Decimal(Arc<BigDecimal>),
    /// DATE and DATEV2.
    Date(Date),
    /// DATETIME and DATETIMEV2.
    DateTime(PrimitiveDateTime),
    /// CHAR, VARCHAR, and STRING.
    Text(Arc<str>),
}

/// Ordered row of values in schema column order.
pub type Row = Vec<Value>;

/// Row tagged with the storage version of the load that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRow {
    /// Committed storage version.
    pub version: StorageVersion,
    /// Row values.
    pub row: Row,
}

impl Value {
    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns a short name of the value kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::TinyInt(_) => "tinyint",
            Self::SmallInt(_) => "smallint",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::LargeInt(_) => "largeint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Text(_) => "text",
        }
    }

    /// Returns the value as `i128` for integer and boolean kinds.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Boolean(value) => Some(i128::from(value)),
            Self::TinyInt(value) => Some(i128::from(value)),
            Self::SmallInt(value) => Some(i128::from(value)),
            Self::Int(value) => Some(i128::from(value)),
            Self::BigInt(value) => Some(i128::from(value)),
            Self::LargeInt(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the canonical text form of the value for `column_type`.
    ///
    /// Returns `None` for NULL. Integers render in decimal form, floats in
    /// shortest round-trip form, dates as `YYYY-MM-DD`, and datetimes as
    /// `YYYY-MM-DD HH:MM:SS` with as many fractional digits as the type scale.
    #[must_use]
    pub fn render(&self, column_type: &ColumnType) -> Option<String> {
        let text = match self {
            Self::Null => return None,
            Self::Boolean(value) => if *value { "1" } else { "0" }.to_string(),
            Self::TinyInt(value) => value.to_string(),
            Self::SmallInt(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::BigInt(value) => value.to_string(),
            Self::LargeInt(value) => value.to_string(),
            Self::Float(value) => render_float(f64::from(*value), &value.to_string(), *value),
            Self::Double(value) => render_float(*value, &value.to_string(), *value),
            Self::Decimal(value) => value.to_plain_string(),
            Self::Date(value) => render_date(*value),
            Self::DateTime(value) => {
                render_datetime(*value, column_type.datetime_scale().unwrap_or(0))
            }
            Self::Text(value) => value.to_string(),
        };
        Some(text)
    }

    /// Compares two values of the same kind with a total order.
    ///
    /// NULL sorts first; floats use IEEE total ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Mismatch`] when the kinds differ.
    pub fn total_cmp(&self, other: &Self) -> Result<Ordering, ValueError> {
        let ordering = match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::TinyInt(a), Self::TinyInt(b)) => a.cmp(b),
            (Self::SmallInt(a), Self::SmallInt(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::BigInt(a), Self::BigInt(b)) => a.cmp(b),
            (Self::LargeInt(a), Self::LargeInt(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (a, b) => return Err(ValueError::Mismatch(a.kind(), b.kind())),
        };
        Ok(ordering)
    }

    /// Adds two numeric values of the same kind. NULL is the identity.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Overflow`] on integer overflow and
    /// [`ValueError::Mismatch`] for non-numeric or differing kinds.
    pub fn checked_add(&self, other: &Self) -> Result<Self, ValueError> {
        let sum = match (self, other) {
            (Self::Null, value) | (value, Self::Null) => value.clone(),
            (Self::TinyInt(a), Self::TinyInt(b)) => {
                Self::TinyInt(a.checked_add(*b).ok_or(ValueError::Overflow)?)
            }
            (Self::SmallInt(a), Self::SmallInt(b)) => {
                Self::SmallInt(a.checked_add(*b).ok_or(ValueError::Overflow)?)
            }
            (Self::Int(a), Self::Int(b)) => Self::Int(a.checked_add(*b).ok_or(ValueError::Overflow)?),
            (Self::BigInt(a), Self::BigInt(b)) => {
                Self::BigInt(a.checked_add(*b).ok_or(ValueError::Overflow)?)
            }
            (Self::LargeInt(a), Self::LargeInt(b)) => {
                Self::LargeInt(a.checked_add(*b).ok_or(ValueError::Overflow)?)
            }
            (Self::Float(a), Self::Float(b)) => Self::Float(a + b),
            (Self::Double(a), Self::Double(b)) => Self::Double(a + b),
            (Self::Decimal(a), Self::Decimal(b)) => Self::Decimal(Arc::new(a.as_ref() + b.as_ref())),
            (a, b) => return Err(ValueError::Mismatch(a.kind(), b.kind())),
        };
        Ok(sum)
    }
}

// ============================================================================
// SECTION: Literal Parsing
// ============================================================================

/// Parses a SQL literal as a value of `column_type`.
///
/// The literal `NULL` (any case) parses as [`Value::Null`]; nullability is
/// enforced by callers.
///
/// # Errors
///
/// Returns [`ValueError`] when the literal is malformed, out of range, or too long.
pub fn parse_literal(literal: &str, column_type: &ColumnType) -> Result<Value, ValueError> {
    if literal.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    let invalid = || ValueError::InvalidLiteral {
        literal: literal.to_string(),
        type_name: column_type.sql(),
    };
    let trimmed = literal.trim();
    match *column_type {
        ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid()),
        },
        ColumnType::TinyInt => trimmed.parse().map(Value::TinyInt).map_err(|_| invalid()),
        ColumnType::SmallInt => trimmed.parse().map(Value::SmallInt).map_err(|_| invalid()),
        ColumnType::Int => trimmed.parse().map(Value::Int).map_err(|_| invalid()),
        ColumnType::BigInt => trimmed.parse().map(Value::BigInt).map_err(|_| invalid()),
        ColumnType::LargeInt => trimmed.parse().map(Value::LargeInt).map_err(|_| invalid()),
        ColumnType::Float => trimmed.parse().map(Value::Float).map_err(|_| invalid()),
        ColumnType::Double => trimmed.parse().map(Value::Double).map_err(|_| invalid()),
        ColumnType::Decimal {
            precision,
            scale,
        } => {
            let parsed = BigDecimal::from_str(trimmed).map_err(|_| invalid())?;
            fit_decimal(&parsed, precision, scale, column_type).map(Value::Decimal)
        }
        ColumnType::Date | ColumnType::DateV2 => parse_date(trimmed).map(Value::Date).ok_or_else(invalid),
        ColumnType::DateTime
        | ColumnType::DateTimeV2 {
            ..
        } => {
            let scale = column_type.datetime_scale().unwrap_or(0);
            parse_datetime(trimmed)
                .map(|value| Value::DateTime(truncate_subsecond(value, scale)))
                .ok_or_else(invalid)
        }
        ColumnType::Char {
            length,
        }
        | ColumnType::Varchar {
            length,
        } => {
            check_text_length(literal, length, column_type)?;
            Ok(Value::Text(Arc::from(literal)))
        }
        ColumnType::String => Ok(Value::Text(Arc::from(literal))),
    }
}

/// Rescales a decimal to `scale` and checks it fits `precision` digits.
///
/// # Errors
///
/// Returns [`ValueError::OutOfRange`] when the integer part has more than
/// `precision - scale` digits.
pub fn fit_decimal(
    value: &BigDecimal,
    precision: u8,
    scale: u8,
    column_type: &ColumnType,
) -> Result<Arc<BigDecimal>, ValueError> {
    let scaled = value.with_scale_round(i64::from(scale), RoundingMode::HalfUp);
    if scaled.digits() > u64::from(precision) {
        return Err(ValueError::OutOfRange {
            value: value.to_plain_string(),
            type_name: column_type.sql(),
        });
    }
    Ok(Arc::new(scaled))
}

/// Checks a text payload against a declared byte length.
///
/// # Errors
///
/// Returns [`ValueError::TooLong`] when the text exceeds `length` bytes.
pub fn check_text_length(
    text: &str,
    length: u32,
    column_type: &ColumnType,
) -> Result<(), ValueError> {
    let limit = usize::try_from(length).unwrap_or(usize::MAX);
    if text.len() > limit {
        return Err(ValueError::TooLong {
            length: text.len(),
            type_name: column_type.sql(),
        });
    }
    Ok(())
}

/// Parses `YYYY-MM-DD`.
fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, format_description!("[year]-[month]-[day]")).ok()
}

/// Parses `YYYY-MM-DD[ HH:MM:SS[.f+]]`.
fn parse_datetime(text: &str) -> Option<PrimitiveDateTime> {
    let with_time = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(text, with_time)
        .ok()
        .or_else(|| parse_date(text).map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT)))
}

/// Truncates fractional seconds to `scale` digits.
#[must_use]
pub fn truncate_subsecond(value: PrimitiveDateTime, scale: u8) -> PrimitiveDateTime {
    let unit = 10_u32.pow(9_u32.saturating_sub(u32::from(scale.min(9))));
    let nanos = value.nanosecond() - value.nanosecond() % unit;
    value.replace_nanosecond(nanos).unwrap_or(value)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a float in shortest round-trip form, switching to exponent form
/// for very large or very small magnitudes so the text stays within 24 bytes.
fn render_float<F: std::fmt::LowerExp>(magnitude: f64, plain: &str, value: F) -> String {
    let abs = magnitude.abs();
    if abs.is_finite() && abs != 0.0 && !(1e-5 ..1e16).contains(&abs) {
        format!("{value:e}")
    } else {
        plain.to_string()
    }
}

/// Renders `YYYY-MM-DD`.
#[must_use]
pub fn render_date(value: Date) -> String {
    format!("{:04}-{:02}-{:02}", value.year(), u8::from(value.month()), value.day())
}

/// Renders `YYYY-MM-DD HH:MM:SS[.f{scale}]`.
#[must_use]
pub fn render_datetime(value: PrimitiveDateTime, scale: u8) -> String {
    let mut text = format!(
        "{} {:02}:{:02}:{:02}",
        render_date(value.date()),
        value.hour(),
        value.minute(),
        value.second()
    );
    let scale = scale.min(9);
    if scale > 0 {
        let digits = usize::from(scale);
        let fraction = value.nanosecond() / 10_u32.pow(9 - u32::from(scale));
        text.push_str(&format!(".{fraction:0digits$}"));
    }
    text
}

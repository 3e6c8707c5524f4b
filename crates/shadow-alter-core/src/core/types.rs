// crates/shadow-alter-core/src/core/types.rs
// ============================================================================
// Module: Shadow Alter Column Types
// Description: Logical column types, type parameters, and type categories.
// Purpose: Provide the supported type enumeration used by schemas and the matrix.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`ColumnType`] is a logical type with its parameters (precision/scale,
//! length, fractional-second scale). Each type belongs to exactly one
//! parameterless [`TypeCategory`]; the compatibility matrix is indexed by
//! category and consults parameters only through guards.
//!
//! Two label forms exist and both are user-visible: the physical label
//! (`DECIMAL128`, `VARCHAR`) used by generic type-change errors, and the
//! lowercase SQL form (`varchar(2)`) used by narrowing errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum DECIMAL precision (DECIMAL256).
pub const MAX_DECIMAL_PRECISION: u8 = 76;
/// Maximum DECIMAL precision stored in 128 bits.
pub const MAX_DECIMAL128_PRECISION: u8 = 38;
/// Maximum fractional-second scale of DATETIMEV2.
pub const MAX_DATETIME_SCALE: u8 = 6;
/// Maximum declared CHAR length.
pub const MAX_CHAR_LENGTH: u32 = 255;
/// Maximum declared VARCHAR length.
pub const MAX_VARCHAR_LENGTH: u32 = 65_533;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Type parameter validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Type parameters are out of range.
    #[error("invalid type parameters for {type_name}: {reason}")]
    InvalidParameters {
        /// SQL form of the offending type.
        type_name: String,
        /// Human-readable reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Type Categories
// ============================================================================

/// Parameterless type category used to index the compatibility matrix.
///
/// # Invariants
/// - [`TypeCategory::ALL`] lists every variant exactly once, in `index` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    /// BOOLEAN.
    Boolean,
    /// TINYINT.
    TinyInt,
    /// SMALLINT.
    SmallInt,
    /// INT.
    Int,
    /// BIGINT.
    BigInt,
    /// LARGEINT.
    LargeInt,
    /// FLOAT.
    Float,
    /// DOUBLE.
    Double,
    /// DECIMAL of any precision.
    Decimal,
    /// DATE.
    Date,
    /// DATETIME.
    DateTime,
    /// DATEV2.
    DateV2,
    /// DATETIMEV2 of any scale.
    DateTimeV2,
    /// CHAR of any length.
    Char,
    /// VARCHAR of any length.
    Varchar,
    /// STRING.
    String,
}

impl TypeCategory {
    /// Number of categories.
    pub const COUNT: usize = 16;

    /// Every category in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Boolean,
        Self::TinyInt,
        Self::SmallInt,
        Self::Int,
        Self::BigInt,
        Self::LargeInt,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Date,
        Self::DateTime,
        Self::DateV2,
        Self::DateTimeV2,
        Self::Char,
        Self::Varchar,
        Self::String,
    ];

    /// Returns the dense matrix index of the category.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Boolean => 0,
            Self::TinyInt => 1,
            Self::SmallInt => 2,
            Self::Int => 3,
            Self::BigInt => 4,
            Self::LargeInt => 5,
            Self::Float => 6,
            Self::Double => 7,
            Self::Decimal => 8,
            Self::Date => 9,
            Self::DateTime => 10,
            Self::DateV2 => 11,
            Self::DateTimeV2 => 12,
            Self::Char => 13,
            Self::Varchar => 14,
            Self::String => 15,
        }
    }

    /// Returns the SQL name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::LargeInt => "LARGEINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::DateV2 => "DATEV2",
            Self::DateTimeV2 => "DATETIMEV2",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::String => "STRING",
        }
    }

    /// Returns true for the fixed-width integer categories (not BOOLEAN).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt | Self::LargeInt)
    }

    /// Returns true for FLOAT and DOUBLE.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Returns true for integer, floating, and decimal categories.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Self::Decimal)
    }

    /// Returns true for the date and datetime categories.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::DateV2 | Self::DateTimeV2)
    }

    /// Returns true for CHAR, VARCHAR, and STRING.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Char | Self::Varchar | Self::String)
    }

    /// Returns true when the category carries a time-of-day component.
    #[must_use]
    pub const fn has_time(self) -> bool {
        matches!(self, Self::DateTime | Self::DateTimeV2)
    }

    /// Returns the widening rank of integer categories (BOOLEAN ranks lowest).
    #[must_use]
    pub const fn integer_rank(self) -> Option<u8> {
        match self {
            Self::Boolean => Some(0),
            Self::TinyInt => Some(1),
            Self::SmallInt => Some(2),
            Self::Int => Some(3),
            Self::BigInt => Some(4),
            Self::LargeInt => Some(5),
            _ => None,
        }
    }

    /// Returns the number of decimal digits needed for any integer of the category.
    #[must_use]
    pub const fn integer_digits(self) -> Option<u8> {
        match self {
            Self::Boolean => Some(1),
            Self::TinyInt => Some(3),
            Self::SmallInt => Some(5),
            Self::Int => Some(10),
            Self::BigInt => Some(19),
            Self::LargeInt => Some(39),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Column Types
// ============================================================================

/// Logical column type with its parameters.
///
/// # Invariants
/// - Parameters are only trusted after [`ColumnType::validate`] succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// Boolean (stored as one byte).
    Boolean,
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 128-bit signed integer.
    LargeInt,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total significant digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Calendar date (legacy encoding).
    Date,
    /// Date and time with whole seconds (legacy encoding).
    DateTime,
    /// Calendar date.
    DateV2,
    /// Date and time with fractional seconds.
    DateTimeV2 {
        /// Fractional-second digits (0..=6).
        scale: u8,
    },
    /// Fixed-length text.
    Char {
        /// Declared length in bytes.
        length: u32,
    },
    /// Variable-length text with a declared maximum.
    Varchar {
        /// Declared maximum length in bytes.
        length: u32,
    },
    /// Unbounded text.
    String,
}

impl ColumnType {
    /// Returns the matrix category of the type.
    #[must_use]
    pub const fn category(&self) -> TypeCategory {
        match self {
            Self::Boolean => TypeCategory::Boolean,
            Self::TinyInt => TypeCategory::TinyInt,
            Self::SmallInt => TypeCategory::SmallInt,
            Self::Int => TypeCategory::Int,
            Self::BigInt => TypeCategory::BigInt,
            Self::LargeInt => TypeCategory::LargeInt,
            Self::Float => TypeCategory::Float,
            Self::Double => TypeCategory::Double,
            Self::Decimal {
                ..
            } => TypeCategory::Decimal,
            Self::Date => TypeCategory::Date,
            Self::DateTime => TypeCategory::DateTime,
            Self::DateV2 => TypeCategory::DateV2,
            Self::DateTimeV2 {
                ..
            } => TypeCategory::DateTimeV2,
            Self::Char {
                ..
            } => TypeCategory::Char,
            Self::Varchar {
                ..
            } => TypeCategory::Varchar,
            Self::String => TypeCategory::String,
        }
    }

    /// Validates type parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidParameters`] when a parameter is out of range.
    pub fn validate(&self) -> Result<(), TypeError> {
        let invalid = |reason: &str| TypeError::InvalidParameters {
            type_name: self.sql(),
            reason: reason.to_string(),
        };
        match *self {
            Self::Decimal {
                precision,
                scale,
            } => {
                if precision == 0 || precision > MAX_DECIMAL_PRECISION {
                    return Err(invalid("precision must be within 1..=76"));
                }
                if scale > precision {
                    return Err(invalid("scale must not exceed precision"));
                }
                Ok(())
            }
            Self::DateTimeV2 {
                scale,
            } => {
                if scale > MAX_DATETIME_SCALE {
                    return Err(invalid("scale must be within 0..=6"));
                }
                Ok(())
            }
            Self::Char {
                length,
            } => {
                if length == 0 || length > MAX_CHAR_LENGTH {
                    return Err(invalid("length must be within 1..=255"));
                }
                Ok(())
            }
            Self::Varchar {
                length,
            } => {
                if length == 0 || length > MAX_VARCHAR_LENGTH {
                    return Err(invalid("length must be within 1..=65533"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the physical storage label used by type-change errors.
    ///
    /// DECIMAL reports its storage width (`DECIMAL32`..`DECIMAL256`), not its
    /// logical name; existing tooling matches on these labels.
    #[must_use]
    pub fn physical_label(&self) -> String {
        match self {
            Self::Decimal {
                precision,
                ..
            } => {
                let width = match precision {
                    0 ..= 9 => 32,
                    10 ..= 18 => 64,
                    19 ..= 38 => 128,
                    _ => 256,
                };
                format!("DECIMAL{width}")
            }
            other => other.base_name().to_ascii_uppercase(),
        }
    }

    /// Returns the lowercase type name without parameters (`varchar`).
    #[must_use]
    pub const fn base_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::LargeInt => "largeint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal {
                ..
            } => "decimal",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateV2 => "datev2",
            Self::DateTimeV2 {
                ..
            } => "datetimev2",
            Self::Char {
                ..
            } => "char",
            Self::Varchar {
                ..
            } => "varchar",
            Self::String => "string",
        }
    }

    /// Returns the lowercase SQL form with parameters (`varchar(2)`).
    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Decimal {
                precision,
                scale,
            } => format!("decimal({precision},{scale})"),
            Self::DateTimeV2 {
                scale,
            } => format!("datetimev2({scale})"),
            Self::Char {
                length,
            } => format!("char({length})"),
            Self::Varchar {
                length,
            } => format!("varchar({length})"),
            other => other.base_name().to_string(),
        }
    }

    /// Returns the maximum width of the canonical textual rendering.
    ///
    /// `None` means the rendering is unbounded (STRING).
    #[must_use]
    pub fn text_width(&self) -> Option<u32> {
        match *self {
            Self::Boolean => Some(1),
            Self::TinyInt => Some(4),
            Self::SmallInt => Some(6),
            Self::Int => Some(11),
            Self::BigInt => Some(20),
            Self::LargeInt => Some(40),
            Self::Float | Self::Double => Some(24),
            Self::Decimal {
                precision,
                ..
            } => Some(u32::from(precision) + 2),
            Self::Date | Self::DateV2 => Some(10),
            Self::DateTime => Some(19),
            Self::DateTimeV2 {
                scale,
            } => Some(if scale == 0 { 19 } else { 20 + u32::from(scale) }),
            Self::Char {
                length,
            }
            | Self::Varchar {
                length,
            } => Some(length),
            Self::String => None,
        }
    }

    /// Returns the declared text length for CHAR/VARCHAR.
    #[must_use]
    pub const fn text_length(&self) -> Option<u32> {
        match *self {
            Self::Char {
                length,
            }
            | Self::Varchar {
                length,
            } => Some(length),
            _ => None,
        }
    }

    /// Returns the fractional-second scale for datetime types.
    #[must_use]
    pub const fn datetime_scale(&self) -> Option<u8> {
        match *self {
            Self::DateTime => Some(0),
            Self::DateTimeV2 {
                scale,
            } => Some(scale),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql().to_ascii_uppercase())
    }
}

/// Returns a representative parameterized type for every category.
///
/// Used to enumerate the matrix; parameters are chosen so that guards on
/// widths and digits are satisfiable.
#[must_use]
pub const fn representative(category: TypeCategory) -> ColumnType {
    match category {
        TypeCategory::Boolean => ColumnType::Boolean,
        TypeCategory::TinyInt => ColumnType::TinyInt,
        TypeCategory::SmallInt => ColumnType::SmallInt,
        TypeCategory::Int => ColumnType::Int,
        TypeCategory::BigInt => ColumnType::BigInt,
        TypeCategory::LargeInt => ColumnType::LargeInt,
        TypeCategory::Float => ColumnType::Float,
        TypeCategory::Double => ColumnType::Double,
        TypeCategory::Decimal => ColumnType::Decimal {
            precision: 38,
            scale: 10,
        },
        TypeCategory::Date => ColumnType::Date,
        TypeCategory::DateTime => ColumnType::DateTime,
        TypeCategory::DateV2 => ColumnType::DateV2,
        TypeCategory::DateTimeV2 => ColumnType::DateTimeV2 {
            scale: 3,
        },
        TypeCategory::Char => ColumnType::Char {
            length: 64,
        },
        TypeCategory::Varchar => ColumnType::Varchar {
            length: 100,
        },
        TypeCategory::String => ColumnType::String,
    }
}

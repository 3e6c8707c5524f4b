// crates/shadow-alter-core/src/runtime/matrix.rs
// ============================================================================
// Module: Type Compatibility Matrix
// Description: Static conversion rules between column types and the column check.
// Purpose: Decide whether a column change is allowed and how rows are rewritten.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The matrix is a `const` table indexed by (source category, target
//! category, target role). Each cell either allows a [`ConversionKind`]
//! subject to a parameter [`Guard`], or denies with a [`DenyKind`]. Cells
//! not enumerated by the rule function are denied.
//!
//! [`check`] applies column-level rules (role, nullability, aggregation,
//! defaults) around the cell lookup, in a fixed order, and returns a
//! [`RewritePlan`]. The executor compiles the same [`ConversionKind`] values,
//! so validation and execution cannot disagree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::schema::AggregationType;
use crate::core::schema::ColumnDef;
use crate::core::schema::ColumnRole;
use crate::core::schema::TableSchema;
use crate::core::types::ColumnType;
use crate::core::types::TypeCategory;
use crate::core::value::Value;
use crate::core::value::parse_literal;

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Row-level conversion applied to a changed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    /// Same type and parameters.
    Identity,
    /// BOOLEAN or integer to a wider integer.
    IntegerWiden,
    /// Integer to DECIMAL.
    IntegerToDecimal,
    /// Small integer to FLOAT or DOUBLE.
    IntegerToFloat,
    /// FLOAT to DOUBLE.
    FloatToDouble,
    /// DECIMAL to DECIMAL with a wider layout.
    DecimalRescale,
    /// DATE and DATEV2 to each other.
    DateToDate,
    /// DATE/DATEV2 to DATETIME/DATETIMEV2.
    DateToDateTime,
    /// DATETIME/DATETIMEV2 to a scale at least as wide.
    DateTimeRescale,
    /// Canonical text rendering into CHAR/VARCHAR/STRING.
    ToText,
    /// Text re-encoded into a text type.
    TextToText,
}

impl ConversionKind {
    /// Returns the snake-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::IntegerWiden => "integer_widen",
            Self::IntegerToDecimal => "integer_to_decimal",
            Self::IntegerToFloat => "integer_to_float",
            Self::FloatToDouble => "float_to_double",
            Self::DecimalRescale => "decimal_rescale",
            Self::DateToDate => "date_to_date",
            Self::DateToDateTime => "date_to_datetime",
            Self::DateTimeRescale => "datetime_rescale",
            Self::ToText => "to_text",
            Self::TextToText => "text_to_text",
        }
    }
}

/// Parameter condition attached to an allowed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// Always holds.
    None,
    /// Target text length covers the source's maximum textual width.
    TextWidth,
    /// Target DECIMAL integer digits cover the source integer digits.
    DecimalDigits,
    /// Target DECIMAL keeps at least the source scale and integer digits.
    DecimalWiden,
    /// Target datetime scale is at least the source scale.
    ScaleWiden,
}

impl Guard {
    /// Returns the snake-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::TextWidth => "text_width",
            Self::DecimalDigits => "decimal_digits",
            Self::DecimalWiden => "decimal_widen",
            Self::ScaleWiden => "scale_widen",
        }
    }
}

/// Denial reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyKind {
    /// KEY column turned into a VALUE column.
    RoleChange,
    /// FLOAT/DOUBLE key target.
    FloatKey,
    /// STRING key target.
    StringKey,
    /// Nullable column made NOT NULL.
    NullableToNotNull,
    /// Value column aggregation changed.
    AggregationChange,
    /// Target default literal invalid for the target type.
    DefaultValue,
    /// Types are not convertible.
    Incompatible,
    /// Target is narrower than the source.
    Narrowing,
    /// Target text is narrower than the source's textual width.
    TextNarrowing,
}

impl DenyKind {
    /// Returns the snake-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoleChange => "role_change",
            Self::FloatKey => "float_key",
            Self::StringKey => "string_key",
            Self::NullableToNotNull => "nullable_to_not_null",
            Self::AggregationChange => "aggregation_change",
            Self::DefaultValue => "default_value",
            Self::Incompatible => "incompatible",
            Self::Narrowing => "narrowing",
            Self::TextNarrowing => "text_narrowing",
        }
    }
}

/// One matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Conversion allowed when the guard holds.
    Allow(ConversionKind, Guard),
    /// Conversion denied.
    Deny(DenyKind),
}

/// Returns the rule for one (source, target, role) triple.
#[allow(
    clippy::match_same_arms,
    reason = "Rules are listed by conversion family for review."
)]
const fn rule(source: TypeCategory, target: TypeCategory, role: ColumnRole) -> Verdict {
    use ConversionKind as K;
    use TypeCategory as C;

    let key = matches!(role, ColumnRole::Key);
    if key && matches!(target, C::Float | C::Double) {
        return Verdict::Deny(DenyKind::FloatKey);
    }
    if key && matches!(target, C::String) {
        return Verdict::Deny(DenyKind::StringKey);
    }

    if let (Some(from), Some(to)) = (source.integer_rank(), target.integer_rank()) {
        return if from == to {
            Verdict::Allow(K::Identity, Guard::None)
        } else if from < to {
            Verdict::Allow(K::IntegerWiden, Guard::None)
        } else {
            Verdict::Deny(DenyKind::Narrowing)
        };
    }

    match (source, target) {
        (C::Boolean | C::TinyInt | C::SmallInt | C::Int | C::BigInt | C::LargeInt, C::Decimal) => {
            Verdict::Allow(K::IntegerToDecimal, Guard::DecimalDigits)
        }
        (C::TinyInt | C::SmallInt, C::Float | C::Double) | (C::Int, C::Double) => {
            Verdict::Allow(K::IntegerToFloat, Guard::None)
        }
        (C::Float, C::Float) | (C::Double, C::Double) => Verdict::Allow(K::Identity, Guard::None),
        (C::Float, C::Double) => Verdict::Allow(K::FloatToDouble, Guard::None),
        (C::Double, C::Float) => Verdict::Deny(DenyKind::Narrowing),
        (C::Decimal, C::Decimal) => Verdict::Allow(K::DecimalRescale, Guard::DecimalWiden),
        (C::Date, C::Date) | (C::DateV2, C::DateV2) | (C::DateTime, C::DateTime) => {
            Verdict::Allow(K::Identity, Guard::None)
        }
        (C::Date | C::DateV2, C::Date | C::DateV2) => Verdict::Allow(K::DateToDate, Guard::None),
        (C::Date | C::DateV2, C::DateTime | C::DateTimeV2) => {
            Verdict::Allow(K::DateToDateTime, Guard::None)
        }
        (C::DateTime | C::DateTimeV2, C::DateTime | C::DateTimeV2) => {
            Verdict::Allow(K::DateTimeRescale, Guard::ScaleWiden)
        }
        (C::DateTime | C::DateTimeV2, C::Date | C::DateV2) => Verdict::Deny(DenyKind::Narrowing),
        (C::Float | C::Double, C::Char | C::Varchar) if key => {
            Verdict::Deny(DenyKind::Incompatible)
        }
        (
            C::TinyInt
            | C::SmallInt
            | C::Int
            | C::BigInt
            | C::LargeInt
            | C::Float
            | C::Double
            | C::Date
            | C::DateV2
            | C::DateTime
            | C::DateTimeV2,
            C::Char | C::Varchar,
        ) => Verdict::Allow(K::ToText, Guard::TextWidth),
        (
            C::TinyInt
            | C::SmallInt
            | C::Int
            | C::BigInt
            | C::LargeInt
            | C::Float
            | C::Double
            | C::Date
            | C::DateV2
            | C::DateTime
            | C::DateTimeV2,
            C::String,
        ) => Verdict::Allow(K::ToText, Guard::None),
        (C::Char, C::Char | C::Varchar) | (C::Varchar, C::Varchar) => {
            Verdict::Allow(K::TextToText, Guard::TextWidth)
        }
        (C::Char | C::Varchar, C::String) => Verdict::Allow(K::TextToText, Guard::None),
        (C::String, C::String) => Verdict::Allow(K::Identity, Guard::None),
        (C::String, C::Char | C::Varchar) => Verdict::Deny(DenyKind::Narrowing),
        _ => Verdict::Deny(DenyKind::Incompatible),
    }
}

/// Number of cells per source category.
const CELLS: usize = TypeCategory::COUNT * 2;

/// Builds the full matrix at compile time.
const fn build_matrix() -> [[Verdict; CELLS]; TypeCategory::COUNT] {
    let mut table = [[Verdict::Deny(DenyKind::Incompatible); CELLS]; TypeCategory::COUNT];
    let mut source = 0;
    while source < TypeCategory::COUNT {
        let mut target = 0;
        while target < TypeCategory::COUNT {
            let mut role = 0;
            while role < ColumnRole::ALL.len() {
                table[source][target * 2 + role] = rule(
                    TypeCategory::ALL[source],
                    TypeCategory::ALL[target],
                    ColumnRole::ALL[role],
                );
                role += 1;
            }
            target += 1;
        }
        source += 1;
    }
    table
}

/// Compatibility matrix indexed by `[source][target * 2 + role]`.
static MATRIX: [[Verdict; CELLS]; TypeCategory::COUNT] = build_matrix();

/// Returns the raw matrix cell for a (source, target, role) triple.
#[must_use]
pub fn verdict(source: TypeCategory, target: TypeCategory, role: ColumnRole) -> Verdict {
    MATRIX[source.index()][target.index() * 2 + role.index()]
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rejected column change.
///
/// # Invariants
/// - The rendered message is fully determined by `kind` and the labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct IncompatibleTypeError {
    /// Denial reason.
    pub kind: DenyKind,
    /// Source label in the form the message uses.
    pub source_label: String,
    /// Target label in the form the message uses.
    pub target_label: String,
    /// Column name.
    pub column: String,
}

impl IncompatibleTypeError {
    /// Renders the canonical message for the denial.
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            DenyKind::RoleChange => {
                format!("Can not change key column[{}] to value column", self.column)
            }
            DenyKind::FloatKey => {
                "Float or double can not used as a key, use decimal instead.".to_string()
            }
            DenyKind::StringKey => {
                format!("String Type should not be used in key column[{}].", self.column)
            }
            DenyKind::NullableToNotNull => "Can not change from nullable to non-nullable".to_string(),
            DenyKind::AggregationChange => "Can not change aggregation type".to_string(),
            DenyKind::DefaultValue => "Can not change default value".to_string(),
            DenyKind::Incompatible => {
                format!("Can not change {} to {}", self.source_label, self.target_label)
            }
            DenyKind::Narrowing => {
                format!("Cannot change {} to {}", self.source_label, self.target_label)
            }
            DenyKind::TextNarrowing => format!(
                "Can not change from wider type {} to narrower type {}",
                self.source_label, self.target_label
            ),
        }
    }

    /// Builds an error using the labels `kind` calls for.
    fn new(kind: DenyKind, source: &ColumnDef, target: &ColumnDef) -> Self {
        let (source_label, target_label) = match kind {
            DenyKind::TextNarrowing => {
                (source.column_type.base_name().to_string(), target.column_type.sql())
            }
            DenyKind::Narrowing => (source.column_type.to_string(), target.column_type.to_string()),
            _ => (source.column_type.physical_label(), target.column_type.physical_label()),
        };
        Self {
            kind,
            source_label,
            target_label,
            column: target.name.clone(),
        }
    }
}

// ============================================================================
// SECTION: Rewrite Plans
// ============================================================================

/// How much of a column's storage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewriteKind {
    /// Values are carried over untouched.
    Unchanged,
    /// Values change representation without text rendering.
    Reinterpret,
    /// Values are rendered or re-encoded as text.
    Rewrite,
}

impl RewriteKind {
    /// Returns the snake-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Reinterpret => "reinterpret",
            Self::Rewrite => "rewrite",
        }
    }
}

/// Approved column change.
#[derive(Debug, Clone, PartialEq)]
pub struct RewritePlan {
    /// Storage impact.
    pub kind: RewriteKind,
    /// Row-level conversion.
    pub conversion: ConversionKind,
    /// Target default parsed as the target type.
    pub default: Option<Value>,
}

// ============================================================================
// SECTION: Column Check
// ============================================================================

/// Checks a column change against the role, nullability, aggregation,
/// default, and type rules.
///
/// # Errors
///
/// Returns [`IncompatibleTypeError`] for the first rule the change violates.
pub fn check(source: &ColumnDef, target: &ColumnDef) -> Result<RewritePlan, IncompatibleTypeError> {
    let deny = |kind| Err(IncompatibleTypeError::new(kind, source, target));
    let source_category = source.column_type.category();
    let target_category = target.column_type.category();

    if source.role == ColumnRole::Key && target.role == ColumnRole::Value {
        return deny(DenyKind::RoleChange);
    }
    if target.role == ColumnRole::Key {
        if target_category.is_float() {
            return deny(DenyKind::FloatKey);
        }
        if target_category == TypeCategory::String {
            return deny(DenyKind::StringKey);
        }
    }
    if source.nullable && !target.nullable {
        return deny(DenyKind::NullableToNotNull);
    }
    if source.role == ColumnRole::Value
        && target.role == ColumnRole::Value
        && source.aggregation != target.aggregation
    {
        return deny(DenyKind::AggregationChange);
    }
    let default = parse_default(target);
    if source_category.is_text() && !target_category.is_text() {
        return match default {
            Err(()) => deny(DenyKind::DefaultValue),
            Ok(_) => deny(DenyKind::Incompatible),
        };
    }

    let conversion = match verdict(source_category, target_category, target.role) {
        Verdict::Deny(kind) => return deny(kind),
        Verdict::Allow(conversion, guard) => {
            if !guard_holds(guard, &source.column_type, &target.column_type) {
                let kind = match guard {
                    Guard::TextWidth => DenyKind::TextNarrowing,
                    _ => DenyKind::Narrowing,
                };
                return deny(kind);
            }
            conversion
        }
    };

    if conversion == ConversionKind::ToText && aggregation_orders_values(target.aggregation) {
        return deny(DenyKind::Incompatible);
    }
    let Ok(default) = default else {
        return deny(DenyKind::DefaultValue);
    };

    let kind = if source.column_type == target.column_type {
        RewriteKind::Unchanged
    } else {
        match conversion {
            ConversionKind::ToText | ConversionKind::TextToText => RewriteKind::Rewrite,
            _ => RewriteKind::Reinterpret,
        }
    };
    let conversion =
        if kind == RewriteKind::Unchanged { ConversionKind::Identity } else { conversion };
    Ok(RewritePlan {
        kind,
        conversion,
        default,
    })
}

/// Checks every column present in both schemas.
///
/// Returns plans keyed by lowercase column name.
///
/// # Errors
///
/// Returns the first [`IncompatibleTypeError`] in target column order.
pub fn plan_alter(
    origin: &TableSchema,
    target: &TableSchema,
) -> Result<BTreeMap<String, RewritePlan>, IncompatibleTypeError> {
    let mut plans = BTreeMap::new();
    for column in &target.columns {
        if let Some((_, source)) = origin.column(&column.name) {
            plans.insert(column.name.to_ascii_lowercase(), check(source, column)?);
        }
    }
    Ok(plans)
}

/// Returns true when the guard holds for the concrete types.
fn guard_holds(guard: Guard, source: &ColumnType, target: &ColumnType) -> bool {
    match guard {
        Guard::None => true,
        Guard::TextWidth => match target.text_length() {
            None => true,
            Some(length) => source.text_width().is_some_and(|width| width <= length),
        },
        Guard::DecimalDigits => match (source.category().integer_digits(), target) {
            (
                Some(digits),
                ColumnType::Decimal {
                    precision,
                    scale,
                },
            ) => precision.saturating_sub(*scale) >= digits,
            _ => false,
        },
        Guard::DecimalWiden => match (source, target) {
            (
                ColumnType::Decimal {
                    precision: from_precision,
                    scale: from_scale,
                },
                ColumnType::Decimal {
                    precision: to_precision,
                    scale: to_scale,
                },
            ) => {
                to_scale >= from_scale
                    && to_precision.saturating_sub(*to_scale)
                        >= from_precision.saturating_sub(*from_scale)
            }
            _ => false,
        },
        Guard::ScaleWiden => match (source.datetime_scale(), target.datetime_scale()) {
            (Some(from), Some(to)) => to >= from,
            _ => false,
        },
    }
}

/// Returns true for aggregations whose result depends on value order or sums.
const fn aggregation_orders_values(aggregation: AggregationType) -> bool {
    aggregation.is_value_sensitive()
}

/// Parses the target default, if any.
fn parse_default(target: &ColumnDef) -> Result<Option<Value>, ()> {
    match &target.default_value {
        None => Ok(None),
        Some(literal) => parse_literal(literal, &target.column_type).map(Some).map_err(|_| ()),
    }
}

// crates/shadow-alter-core/src/core/schema.rs
// ============================================================================
// Module: Shadow Alter Table Schemas
// Description: Column definitions, table schemas, and alter requests.
// Purpose: Describe table layouts and derive target schemas from DDL operations.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`TableSchema`] is an immutable, versioned description of a table. Key
//! columns form a prefix of the column list; value columns follow. The keys
//! model decides how rows sharing a key are merged on read.
//!
//! [`TableSchema::apply_alter`] derives the target schema of an
//! [`AlterTableRequest`] and reports which columns the request touches. It
//! does not consult the compatibility matrix; callers validate modified
//! columns against the matrix before validating the target schema.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::TableId;
use crate::core::types::ColumnType;
use crate::core::types::TypeCategory;
use crate::core::types::TypeError;
use crate::core::value::parse_literal;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema validation and alter derivation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Table declares no columns.
    #[error("table must declare at least one column")]
    NoColumns,
    /// Table declares no key columns.
    #[error("table must declare at least one key column")]
    NoKeyColumns,
    /// Column name appears more than once.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// Key column follows a value column.
    #[error("key column[{0}] must precede value columns")]
    KeyNotPrefix(String),
    /// Key column declares an aggregation.
    #[error("key column[{0}] must not declare an aggregation")]
    KeyAggregation(String),
    /// Aggregate-model value column lacks an aggregation.
    #[error("value column[{0}] must declare an aggregation in the aggregate keys model")]
    MissingAggregation(String),
    /// Non-aggregate value column declares an aggregation.
    #[error("value column[{0}] must not declare an aggregation outside the aggregate keys model")]
    UnexpectedAggregation(String),
    /// Floating point key column.
    #[error("Float or double can not used as a key, use decimal instead.")]
    FloatKey,
    /// STRING key column.
    #[error("String Type should not be used in key column[{0}].")]
    StringKey(String),
    /// Column type parameters are invalid.
    #[error(transparent)]
    Type(#[from] TypeError),
    /// Column default literal does not parse as the column type.
    #[error("Invalid default value for column[{0}]")]
    InvalidDefault(String),
    /// Referenced column does not exist.
    #[error("Column[{0}] does not exist")]
    UnknownColumn(String),
    /// Added column already exists.
    #[error("Can not add column which already exists in base table: {0}")]
    ColumnExists(String),
    /// Key column drop.
    #[error("Can not drop key column[{0}]")]
    DropKeyColumn(String),
    /// Added NOT NULL column without default.
    #[error("Can not add not null column[{0}] without default value")]
    NotNullWithoutDefault(String),
    /// Column touched by more than one operation.
    #[error("Column[{0}] is altered more than once")]
    RepeatedColumn(String),
    /// Alter request carries no operations.
    #[error("alter request has no operations")]
    EmptyAlter,
    /// Alter request targets another table.
    #[error("alter request targets table {request} but schema is table {schema}")]
    TableMismatch {
        /// Table named by the request.
        request: TableId,
        /// Table described by the schema.
        schema: TableId,
    },
}

// ============================================================================
// SECTION: Column Definitions
// ============================================================================

/// Column role within the table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// Part of the sort/merge key.
    Key,
    /// Non-key column.
    Value,
}

impl ColumnRole {
    /// Both roles in matrix index order.
    pub const ALL: [Self; 2] = [Self::Key, Self::Value];

    /// Returns the dense matrix index of the role.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Key => 0,
            Self::Value => 1,
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Key => "key",
            Self::Value => "value",
        })
    }
}

/// Aggregation applied to value columns of aggregate-model tables.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    /// No aggregation (keys, duplicate and unique models).
    #[default]
    None,
    /// Numeric sum.
    Sum,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Latest value wins.
    Replace,
    /// Latest non-null value wins.
    ReplaceIfNotNull,
}

impl AggregationType {
    /// Returns true when the aggregation orders or sums values.
    #[must_use]
    pub const fn is_value_sensitive(self) -> bool {
        matches!(self, Self::Sum | Self::Min | Self::Max)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Replace => "REPLACE",
            Self::ReplaceIfNotNull => "REPLACE_IF_NOT_NULL",
        })
    }
}

/// Rule deciding how rows with equal keys combine on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeysModel {
    /// Every row is kept.
    Duplicate,
    /// The latest row per key wins.
    Unique,
    /// Value columns combine by their aggregation.
    Aggregate,
}

/// Column definition.
///
/// # Invariants
/// - `name` comparisons are ASCII case-insensitive.
/// - `default_value` is SQL literal text; it is parsed against `column_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type with parameters.
    pub column_type: ColumnType,
    /// Whether NULL is accepted.
    #[serde(default)]
    pub nullable: bool,
    /// Key or value role.
    pub role: ColumnRole,
    /// Aggregation for aggregate-model value columns.
    #[serde(default)]
    pub aggregation: AggregationType,
    /// Default literal used when rows lack the column.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl ColumnDef {
    /// Creates a NOT NULL key column.
    #[must_use]
    pub fn key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            role: ColumnRole::Key,
            aggregation: AggregationType::None,
            default_value: None,
            comment: None,
        }
    }

    /// Creates a nullable value column without aggregation.
    #[must_use]
    pub fn value(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            role: ColumnRole::Value,
            aggregation: AggregationType::None,
            default_value: None,
            comment: None,
        }
    }

    /// Sets nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the aggregation.
    #[must_use]
    pub fn with_aggregation(mut self, aggregation: AggregationType) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Sets the default literal.
    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Returns true when `name` refers to this column.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns true for key columns.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.role == ColumnRole::Key
    }
}

// ============================================================================
// SECTION: Table Schemas
// ============================================================================

/// Versioned table schema.
///
/// # Invariants
/// - Holds after [`TableSchema::validate`]: see the checks listed there.
/// - A published schema is never mutated; alters produce a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table identifier.
    pub table_id: TableId,
    /// Table name.
    pub table_name: String,
    /// Schema version.
    pub version: SchemaVersion,
    /// Keys model.
    pub keys_model: KeysModel,
    /// Ordered columns; keys first.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Validates the schema invariants.
    ///
    /// Checks: at least one column and one key, unique names, key prefix,
    /// aggregation placement per keys model, key type restrictions, type
    /// parameters, and default literals.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found, in column order.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns);
        }
        if !self.columns.first().is_some_and(ColumnDef::is_key) {
            return Err(SchemaError::NoKeyColumns);
        }
        let mut seen_value = false;
        for (index, column) in self.columns.iter().enumerate() {
            if self.columns[.. index].iter().any(|prior| prior.is_named(&column.name)) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
            column.column_type.validate()?;
            match column.role {
                ColumnRole::Key => {
                    if seen_value {
                        return Err(SchemaError::KeyNotPrefix(column.name.clone()));
                    }
                    if column.aggregation != AggregationType::None {
                        return Err(SchemaError::KeyAggregation(column.name.clone()));
                    }
                    match column.column_type.category() {
                        TypeCategory::Float | TypeCategory::Double => {
                            return Err(SchemaError::FloatKey);
                        }
                        TypeCategory::String => {
                            return Err(SchemaError::StringKey(column.name.clone()));
                        }
                        _ => {}
                    }
                }
                ColumnRole::Value => {
                    seen_value = true;
                    let aggregated = column.aggregation != AggregationType::None;
                    match self.keys_model {
                        KeysModel::Aggregate if !aggregated => {
                            return Err(SchemaError::MissingAggregation(column.name.clone()));
                        }
                        KeysModel::Duplicate | KeysModel::Unique if aggregated => {
                            return Err(SchemaError::UnexpectedAggregation(column.name.clone()));
                        }
                        _ => {}
                    }
                }
            }
            if let Some(literal) = &column.default_value {
                parse_literal(literal, &column.column_type)
                    .map_err(|_| SchemaError::InvalidDefault(column.name.clone()))?;
            }
        }
        Ok(())
    }

    /// Returns the position and definition of a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<(usize, &ColumnDef)> {
        self.columns.iter().enumerate().find(|(_, column)| column.is_named(name))
    }

    /// Returns the number of leading key columns.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.columns.iter().take_while(|column| column.is_key()).count()
    }

    /// Derives the target schema of an alter request.
    ///
    /// The returned schema carries the next schema version. The second value
    /// lists the lowercase names of every column the request touches.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when an operation references a missing column,
    /// adds an existing one, drops a key, or touches a column twice. The
    /// resulting schema is not validated here.
    pub fn apply_alter(
        &self,
        request: &AlterTableRequest,
    ) -> Result<(Self, Vec<String>), SchemaError> {
        if request.table_id != self.table_id {
            return Err(SchemaError::TableMismatch {
                request: request.table_id,
                schema: self.table_id,
            });
        }
        if request.ops.is_empty() {
            return Err(SchemaError::EmptyAlter);
        }
        let mut columns = self.columns.clone();
        let mut touched: Vec<String> = Vec::with_capacity(request.ops.len());
        for op in &request.ops {
            let name = op.column_name().to_ascii_lowercase();
            if touched.contains(&name) {
                return Err(SchemaError::RepeatedColumn(op.column_name().to_string()));
            }
            match op {
                AlterOp::ModifyColumn(column) => {
                    let slot = columns
                        .iter_mut()
                        .find(|existing| existing.is_named(&column.name))
                        .ok_or_else(|| SchemaError::UnknownColumn(column.name.clone()))?;
                    *slot = column.clone();
                }
                AlterOp::AddColumn {
                    column,
                    after,
                } => {
                    if columns.iter().any(|existing| existing.is_named(&column.name)) {
                        return Err(SchemaError::ColumnExists(column.name.clone()));
                    }
                    if !column.nullable && column.default_value.is_none() {
                        return Err(SchemaError::NotNullWithoutDefault(column.name.clone()));
                    }
                    let position = match after {
                        Some(anchor) => {
                            columns
                                .iter()
                                .position(|existing| existing.is_named(anchor))
                                .ok_or_else(|| SchemaError::UnknownColumn(anchor.clone()))?
                                + 1
                        }
                        None if column.is_key() => {
                            columns.iter().take_while(|existing| existing.is_key()).count()
                        }
                        None => columns.len(),
                    };
                    columns.insert(position, column.clone());
                }
                AlterOp::DropColumn {
                    name: dropped,
                } => {
                    let position = columns
                        .iter()
                        .position(|existing| existing.is_named(dropped))
                        .ok_or_else(|| SchemaError::UnknownColumn(dropped.clone()))?;
                    if columns[position].is_key() {
                        return Err(SchemaError::DropKeyColumn(dropped.clone()));
                    }
                    columns.remove(position);
                }
            }
            touched.push(name);
        }
        let target = Self {
            table_id: self.table_id,
            table_name: self.table_name.clone(),
            version: self.version.next(),
            keys_model: self.keys_model,
            columns,
        };
        Ok((target, touched))
    }
}

// ============================================================================
// SECTION: Alter Requests
// ============================================================================

/// One DDL operation of an alter request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlterOp {
    /// Replace a column definition (type, nullability, default, role).
    ModifyColumn(ColumnDef),
    /// Add a column, optionally after a named column.
    AddColumn {
        /// New column.
        column: ColumnDef,
        /// Column to insert after; keys go after the last key otherwise.
        #[serde(default)]
        after: Option<String>,
    },
    /// Drop a value column.
    DropColumn {
        /// Column name.
        name: String,
    },
}

impl AlterOp {
    /// Returns the column name the operation targets.
    #[must_use]
    pub fn column_name(&self) -> &str {
        match self {
            Self::ModifyColumn(column)
            | Self::AddColumn {
                column,
                ..
            } => &column.name,
            Self::DropColumn {
                name,
            } => name,
        }
    }
}

/// Alter table request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTableRequest {
    /// Target table.
    pub table_id: TableId,
    /// Operations applied in order.
    pub ops: Vec<AlterOp>,
}

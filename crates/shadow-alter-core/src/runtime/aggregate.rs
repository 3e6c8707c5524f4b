// crates/shadow-alter-core/src/runtime/aggregate.rs
// ============================================================================
// Module: Read-Time Row Merging
// Description: Merge versioned rows according to the table keys model.
// Purpose: Give originals and shadows identical read semantics.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Storage keeps every loaded row with its version. Reads merge rows that
//! share a key: duplicate tables keep all rows, unique tables keep the
//! latest, and aggregate tables fold value columns by their aggregation in
//! version order. Output is sorted by key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use crate::core::schema::AggregationType;
use crate::core::schema::KeysModel;
use crate::core::schema::TableSchema;
use crate::core::value::Row;
use crate::core::value::Value;
use crate::core::value::ValueError;
use crate::core::value::VersionedRow;

// ============================================================================
// SECTION: Merging
// ============================================================================

/// Merges versioned rows into the visible rows of a table.
///
/// # Errors
///
/// Returns [`ValueError`] when an aggregation overflows or combines
/// mismatched values.
pub fn merge_rows(schema: &TableSchema, mut rows: Vec<VersionedRow>) -> Result<Vec<Row>, ValueError> {
    let keys = schema.key_count();
    rows.sort_by(|left, right| {
        compare_keys(&left.row, &right.row, keys).then(left.version.cmp(&right.version))
    });
    if schema.keys_model == KeysModel::Duplicate {
        return Ok(rows.into_iter().map(|row| row.row).collect());
    }
    let mut merged: Vec<Row> = Vec::with_capacity(rows.len());
    for VersionedRow {
        row,
        ..
    } in rows
    {
        match merged.last_mut() {
            Some(current) if compare_keys(current, &row, keys) == Ordering::Equal => {
                match schema.keys_model {
                    KeysModel::Unique => *current = row,
                    KeysModel::Aggregate => fold_row(schema, current, row)?,
                    KeysModel::Duplicate => merged.push(row),
                }
            }
            _ => merged.push(row),
        }
    }
    Ok(merged)
}

/// Folds `next` into `current` column by column.
fn fold_row(schema: &TableSchema, current: &mut Row, next: Row) -> Result<(), ValueError> {
    for ((slot, value), column) in current.iter_mut().zip(next).zip(&schema.columns) {
        if column.is_key() {
            continue;
        }
        match column.aggregation {
            AggregationType::Sum => *slot = slot.checked_add(&value)?,
            AggregationType::Min => {
                if !value.is_null() && (slot.is_null() || value.total_cmp(slot)? == Ordering::Less) {
                    *slot = value;
                }
            }
            AggregationType::Max => {
                if !value.is_null()
                    && (slot.is_null() || value.total_cmp(slot)? == Ordering::Greater)
                {
                    *slot = value;
                }
            }
            AggregationType::ReplaceIfNotNull => {
                if !value.is_null() {
                    *slot = value;
                }
            }
            AggregationType::Replace | AggregationType::None => *slot = value,
        }
    }
    Ok(())
}

/// Compares the key prefix of two rows.
///
/// Mismatched value kinds order by kind name so the order stays total.
#[must_use]
pub fn compare_keys(left: &[Value], right: &[Value], keys: usize) -> Ordering {
    for (a, b) in left.iter().zip(right).take(keys) {
        let ordering = a.total_cmp(b).unwrap_or_else(|_| a.kind().cmp(b.kind()));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

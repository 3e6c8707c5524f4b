// crates/shadow-alter-core/src/runtime/shadow.rs
// ============================================================================
// Module: Shadow Replica Builder
// Description: Shadow allocation, column reservations, replay, and cleanup.
// Purpose: Maintain one converted shadow per shard until the swap.
// Dependencies: crate::core, crate::interfaces, crate::runtime::convert
// ============================================================================

//! ## Overview
//! Each shard of an altered table gets a shadow laid out for the target
//! schema. Backfill fills the shadow up to the shard's watermark version;
//! [`catch_up`] then replays every later original version in order. Replay
//! first truncates anything above the recorded applied version, so a replay
//! interrupted before its progress was persisted can simply run again.
//!
//! [`ColumnReservations`] enforces one open build per (table, column set).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::identifiers::JobId;
use crate::core::identifiers::StorageVersion;
use crate::core::identifiers::TableId;
use crate::core::job::SchemaChangeJob;
use crate::core::job::ShadowReplica;
use crate::core::schema::TableSchema;
use crate::core::value::VersionedRow;
use crate::interfaces::ShardPlacement;
use crate::interfaces::ShardStorage;
use crate::interfaces::StorageError;
use crate::runtime::convert::ConversionError;
use crate::runtime::convert::ConversionPlan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Shadow builder errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    /// Another open build on the table touches an overlapping column set.
    #[error("schema change in progress")]
    Conflict {
        /// Table identifier.
        table_id: TableId,
        /// Job holding the overlapping reservation.
        holder: JobId,
    },
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Row conversion failure during replay.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

// ============================================================================
// SECTION: Column Reservations
// ============================================================================

/// Column sets reserved by open builds.
#[derive(Debug, Default, Clone)]
pub struct ColumnReservations {
    /// Reserved lowercase column names per (table, job).
    reserved: BTreeMap<(TableId, JobId), Vec<String>>,
}

impl ColumnReservations {
    /// Creates an empty reservation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `columns` on `table_id` for `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Conflict`] when another job of the same table
    /// holds any of the columns.
    pub fn reserve(
        &mut self,
        table_id: TableId,
        columns: &[String],
        job_id: JobId,
    ) -> Result<(), BuilderError> {
        let conflict = self.reserved.iter().find(|((table, holder), held)| {
            *table == table_id
                && *holder != job_id
                && held.iter().any(|column| columns.iter().any(|wanted| wanted.eq_ignore_ascii_case(column)))
        });
        if let Some(((_, holder), _)) = conflict {
            return Err(BuilderError::Conflict {
                table_id,
                holder: *holder,
            });
        }
        self.reserved.insert(
            (table_id, job_id),
            columns.iter().map(|column| column.to_ascii_lowercase()).collect(),
        );
        Ok(())
    }

    /// Releases every reservation of a job.
    pub fn release(&mut self, job_id: JobId) {
        self.reserved.retain(|(_, holder), _| *holder != job_id);
    }

    /// Returns true when the job holds a reservation.
    #[must_use]
    pub fn holds(&self, job_id: JobId) -> bool {
        self.reserved.keys().any(|(_, holder)| *holder == job_id)
    }
}

// ============================================================================
// SECTION: Shadow Lifecycle
// ============================================================================

/// Allocates one shadow per shard and records the mapping in the job.
///
/// On failure the job keeps the shadows allocated so far; callers discard
/// them with [`discard`].
///
/// # Errors
///
/// Returns [`StorageError`] when any allocation fails.
pub fn allocate<S: ShardStorage>(
    storage: &S,
    job: &mut SchemaChangeJob,
    shards: &[ShardPlacement],
) -> Result<(), StorageError> {
    job.replicas = Vec::with_capacity(shards.len());
    for placement in shards {
        let shadow = storage.allocate_shadow(&placement.handle, &job.target_schema)?;
        job.replicas.push(ShadowReplica {
            shard_id: placement.shard_id,
            original: placement.handle.clone(),
            shadow,
            watermark_version: None,
            applied_version: StorageVersion::ZERO,
        });
    }
    Ok(())
}

/// Drops and re-creates the shadow of one replica for a retry.
///
/// # Errors
///
/// Returns [`StorageError`] when the drop or the allocation fails.
pub fn reallocate<S: ShardStorage>(
    storage: &S,
    replica: &mut ShadowReplica,
    schema: &TableSchema,
) -> Result<(), StorageError> {
    storage.discard(&replica.shadow)?;
    replica.shadow = storage.allocate_shadow(&replica.original, schema)?;
    replica.applied_version = StorageVersion::ZERO;
    Ok(())
}

/// Drops every shadow of a job.
///
/// # Errors
///
/// Returns the first [`StorageError`]; remaining shadows are still dropped.
pub fn discard<S: ShardStorage>(storage: &S, job: &SchemaChangeJob) -> Result<(), StorageError> {
    let mut first_error = None;
    for replica in &job.replicas {
        if let Err(err) = storage.discard(&replica.shadow) {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Replays original versions above `applied_version` into the shadow.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`BuilderError`] when a scan, write, or conversion fails. The
/// replica is only advanced after the write succeeds.
pub fn catch_up<S: ShardStorage>(
    storage: &S,
    plan: &ConversionPlan,
    replica: &mut ShadowReplica,
) -> Result<u64, BuilderError> {
    let visible = storage.visible_version(&replica.original)?;
    if visible <= replica.applied_version {
        return Ok(0);
    }
    storage.truncate_after(&replica.shadow, replica.applied_version)?;
    let source = storage.scan(&replica.original, replica.applied_version, visible)?;
    let mut converted = Vec::with_capacity(source.len());
    for VersionedRow {
        version,
        row,
    } in source
    {
        converted.push(VersionedRow {
            version,
            row: plan.convert_row(&row)?,
        });
    }
    let rows = u64::try_from(converted.len()).unwrap_or(u64::MAX);
    storage.write(&replica.shadow, converted)?;
    replica.applied_version = visible;
    Ok(rows)
}

// crates/shadow-alter-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shadow Alter Interfaces
// Description: Backend-agnostic interfaces for storage, catalog, jobs, and workers.
// Purpose: Define the collaborator contracts used by the schema change runtime.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The coordinator owns job state and drives it through these traits.
//! Implementations must be thread-safe and fail closed: an operation that
//! cannot be completed returns an error rather than a partial result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::JobId;
use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::ShardId;
use crate::core::identifiers::StorageHandle;
use crate::core::identifiers::StorageVersion;
use crate::core::identifiers::TableId;
use crate::core::identifiers::TxnId;
use crate::core::job::SchemaChangeJob;
use crate::core::schema::TableSchema;
use crate::core::value::VersionedRow;
use crate::runtime::convert::ConversionPlan;

// ============================================================================
// SECTION: Shard Storage
// ============================================================================

/// Storage layer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Handle is not known to the storage layer.
    #[error("unknown storage handle: {0}")]
    UnknownHandle(String),
    /// Storage is unavailable or an operation failed.
    #[error("storage io error: {0}")]
    Io(String),
    /// Rows do not match the storage schema.
    #[error("storage invalid data: {0}")]
    Invalid(String),
}

/// Per-shard physical storage.
///
/// Each handle owns a schema and a sequence of committed rows tagged with
/// storage versions. Versions are a per-handle total order.
pub trait ShardStorage: Send + Sync {
    /// Creates an empty shadow unit next to `original`, laid out for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when allocation fails.
    fn allocate_shadow(
        &self,
        original: &StorageHandle,
        schema: &TableSchema,
    ) -> Result<StorageHandle, StorageError>;

    /// Returns the highest committed version of a unit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the handle is unknown.
    fn visible_version(&self, handle: &StorageHandle) -> Result<StorageVersion, StorageError>;

    /// Returns rows with versions in `(after, upto]`, in version order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the scan fails.
    fn scan(
        &self,
        handle: &StorageHandle,
        after: StorageVersion,
        upto: StorageVersion,
    ) -> Result<Vec<VersionedRow>, StorageError>;

    /// Appends rows to a unit, keeping their versions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn write(&self, handle: &StorageHandle, rows: Vec<VersionedRow>) -> Result<(), StorageError>;

    /// Removes rows with versions above `after`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the handle is unknown.
    fn truncate_after(
        &self,
        handle: &StorageHandle,
        after: StorageVersion,
    ) -> Result<(), StorageError>;

    /// Exchanges the contents of two units.
    ///
    /// After a swap `original` serves the converted data and `shadow` holds
    /// the previous data until it is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when either handle is unknown or the swap fails.
    fn swap(&self, original: &StorageHandle, shadow: &StorageHandle) -> Result<(), StorageError>;

    /// Drops a unit. Unknown handles are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the drop fails.
    fn discard(&self, handle: &StorageHandle) -> Result<(), StorageError>;

    /// Returns the schema version a unit is laid out for.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the handle is unknown.
    fn schema_version(&self, handle: &StorageHandle) -> Result<SchemaVersion, StorageError>;
}

// ============================================================================
// SECTION: Table Catalog
// ============================================================================

/// Catalog and transaction tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Table is not known.
    #[error("unknown table: {0}")]
    UnknownTable(TableId),
    /// Publish lost a compare-and-set race.
    #[error("schema version conflict on table {table_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Table identifier.
        table_id: TableId,
        /// Version the publisher derived from.
        expected: SchemaVersion,
        /// Version currently published.
        actual: SchemaVersion,
    },
    /// Catalog is unavailable.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Placement of one shard of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlacement {
    /// Shard identifier.
    pub shard_id: ShardId,
    /// Storage handle serving the shard.
    pub handle: StorageHandle,
}

/// Current schema and placement of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Published schema.
    pub schema: TableSchema,
    /// Shards in placement order.
    pub shards: Vec<ShardPlacement>,
}

/// Metadata catalog.
pub trait TableCatalog: Send + Sync {
    /// Describes a table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownTable`] for unknown tables.
    fn describe(&self, table_id: TableId) -> Result<TableDescriptor, CatalogError>;

    /// Publishes `schema` if the current version equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::VersionConflict`] when the version moved.
    fn publish(
        &self,
        table_id: TableId,
        expected: SchemaVersion,
        schema: TableSchema,
    ) -> Result<(), CatalogError>;
}

/// In-flight write transaction tracker.
pub trait TransactionTracker: Send + Sync {
    /// Lists transactions currently open on a table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the tracker is unavailable.
    fn active_transactions(&self, table_id: TableId) -> Result<Vec<TxnId>, CatalogError>;

    /// Returns true once a transaction committed or aborted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the tracker is unavailable.
    fn is_resolved(&self, txn_id: TxnId) -> Result<bool, CatalogError>;
}

// ============================================================================
// SECTION: Job Store
// ============================================================================

/// Job store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("job store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("job store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("job store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("job store invalid data: {0}")]
    Invalid(String),
}

/// Durable job metadata store.
pub trait JobStore {
    /// Persists the latest snapshot of a job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn persist(&self, job: &SchemaChangeJob) -> Result<(), StoreError>;

    /// Loads one job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self, job_id: JobId) -> Result<Option<SchemaChangeJob>, StoreError>;

    /// Loads every non-terminal job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_pending(&self) -> Result<Vec<SchemaChangeJob>, StoreError>;

    /// Lists jobs, optionally for one table, ordered by job id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list(&self, table_id: Option<TableId>) -> Result<Vec<SchemaChangeJob>, StoreError>;

    /// Removes a job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when removal fails.
    fn archive(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Returns the highest job id ever persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn max_job_id(&self) -> Result<Option<JobId>, StoreError>;
}

// ============================================================================
// SECTION: Task Runner
// ============================================================================

/// Task dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Worker pool is shut down.
    #[error("worker pool is closed")]
    Closed,
    /// Assignment was rejected.
    #[error("task rejected: {0}")]
    Rejected(String),
}

/// Cooperative cancellation flag shared between the coordinator and a worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One backfill attempt for one shard.
#[derive(Clone)]
pub struct TaskAssignment {
    /// Owning job.
    pub job_id: JobId,
    /// Shard being converted.
    pub shard_id: ShardId,
    /// Attempt number (1-based).
    pub attempt: u32,
    /// Original storage handle.
    pub original: StorageHandle,
    /// Shadow storage handle of this attempt.
    pub shadow: StorageHandle,
    /// Highest original version to backfill.
    pub watermark: StorageVersion,
    /// Compiled row conversion.
    pub plan: Arc<ConversionPlan>,
    /// Cancellation flag checked between batches.
    pub cancel: CancelFlag,
    /// Report channel back to the coordinator.
    pub reports: Sender<TaskReport>,
}

/// Outcome reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskReportKind {
    /// Rows written so far.
    Progress {
        /// Cumulative rows written.
        rows: u64,
    },
    /// Backfill complete.
    Finished {
        /// Rows written.
        rows: u64,
        /// Digest of the converted rows in scan order.
        digest: HashDigest,
    },
    /// Attempt failed.
    Failed {
        /// Failure reason.
        error: String,
    },
    /// Attempt observed its cancel flag.
    Cancelled,
}

/// Report sent by a worker for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Owning job.
    pub job_id: JobId,
    /// Shard being converted.
    pub shard_id: ShardId,
    /// Attempt the report belongs to.
    pub attempt: u32,
    /// Report payload.
    pub kind: TaskReportKind,
}

/// Executes backfill assignments.
pub trait TaskRunner {
    /// Queues an assignment for execution.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the runner cannot accept work.
    fn submit(&self, assignment: TaskAssignment) -> Result<(), DispatchError>;
}

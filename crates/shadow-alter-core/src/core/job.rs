// crates/shadow-alter-core/src/core/job.rs
// ============================================================================
// Module: Shadow Alter Job Records
// Description: Persisted schema change jobs, shadow replicas, and shard tasks.
// Purpose: Define the durable job record and the status surface callers poll.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`SchemaChangeJob`] is the unit of persistence: every state change is
//! written through the job store before it is acted upon, so a restarted
//! coordinator can resume from the record alone.
//!
//! Failures end in [`JobState::Cancelled`] with a non-empty `error`. There is
//! no separate failed state at the job level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::JobId;
use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::ShardId;
use crate::core::identifiers::StorageHandle;
use crate::core::identifiers::StorageVersion;
use crate::core::identifiers::TableId;
use crate::core::identifiers::TxnId;
use crate::core::schema::TableSchema;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Job State
// ============================================================================

/// Lifecycle state of a schema change job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted and persisted; shadows not yet allocated.
    Pending,
    /// Shadows allocated; waiting for in-flight writes to resolve.
    WaitingTxn,
    /// Conversion tasks dispatched.
    Running,
    /// Swap published.
    Finished,
    /// Cancelled by request, timeout, or failure.
    Cancelled,
}

impl JobState {
    /// Returns true for FINISHED and CANCELLED.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Returns true when `next` is a legal successor state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::WaitingTxn | Self::Cancelled)
                | (Self::WaitingTxn, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Finished | Self::Cancelled)
        )
    }

    /// Returns the stable upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::WaitingTxn => "WAITING_TXN",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Shadow Replicas and Tasks
// ============================================================================

/// Mapping from one original shard to its shadow.
///
/// # Invariants
/// - `applied_version` never exceeds the original's visible version.
/// - Every original version up to `applied_version` is converted into `shadow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowReplica {
    /// Shard being converted.
    pub shard_id: ShardId,
    /// Original storage handle.
    pub original: StorageHandle,
    /// Shadow storage handle.
    pub shadow: StorageHandle,
    /// Backfill watermark version fixed when the job enters RUNNING.
    pub watermark_version: Option<StorageVersion>,
    /// Highest original version converted into the shadow.
    pub applied_version: StorageVersion,
}

/// Status of one shard conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet dispatched.
    Created,
    /// Dispatched to a worker.
    Running,
    /// Backfill complete.
    Finished,
    /// Last attempt failed; retried until the retry bound is reached.
    Failed,
}

/// Backfill task for one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConversionTask {
    /// Shard being converted.
    pub shard_id: ShardId,
    /// Original storage handle.
    pub original: StorageHandle,
    /// Shadow storage handle of the current attempt.
    pub shadow: StorageHandle,
    /// Task status.
    pub status: TaskStatus,
    /// Rows written by the current attempt.
    pub rows_converted: u64,
    /// Number of dispatches so far.
    pub attempts: u32,
    /// Start time of the current attempt.
    pub started_at: Option<Timestamp>,
    /// Error of the last failed attempt.
    pub last_error: Option<String>,
    /// Digest of converted rows reported by the finishing attempt.
    pub digest: Option<HashDigest>,
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// Persisted schema change job.
///
/// # Invariants
/// - `target_schema.version == origin_version.next()`.
/// - `touched_columns` holds lowercase column names.
/// - `error` is set whenever `state` is CANCELLED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChangeJob {
    /// Job identifier.
    pub job_id: JobId,
    /// Table identifier.
    pub table_id: TableId,
    /// Table name at submission.
    pub table_name: String,
    /// Schema version the job was derived from.
    pub origin_version: SchemaVersion,
    /// Schema at submission.
    pub origin_schema: TableSchema,
    /// Schema published on success.
    pub target_schema: TableSchema,
    /// Columns reserved by the job.
    pub touched_columns: Vec<String>,
    /// Lifecycle state.
    pub state: JobState,
    /// Write transactions that must resolve before backfill.
    pub watermark_txns: Vec<TxnId>,
    /// Shadow mapping per shard.
    pub replicas: Vec<ShadowReplica>,
    /// Conversion task per shard.
    pub tasks: Vec<ShardConversionTask>,
    /// Submission time.
    pub created_at: Timestamp,
    /// Terminal transition time.
    pub finished_at: Option<Timestamp>,
    /// Job timeout in milliseconds.
    pub timeout_ms: u64,
    /// Set while replicas may be swapped; cleared when a swap is rolled back.
    pub swap_pending: bool,
    /// Failure or cancellation reason.
    pub error: Option<String>,
}

impl SchemaChangeJob {
    /// Returns the replica for a shard.
    #[must_use]
    pub fn replica(&self, shard_id: ShardId) -> Option<&ShadowReplica> {
        self.replicas.iter().find(|replica| replica.shard_id == shard_id)
    }

    /// Returns the number of tasks in FINISHED.
    #[must_use]
    pub fn finished_tasks(&self) -> usize {
        self.tasks.iter().filter(|task| task.status == TaskStatus::Finished).count()
    }

    /// Returns the status view of the job.
    #[must_use]
    pub fn status(&self) -> AlterJobStatus {
        let progress = match self.state {
            JobState::Pending | JobState::WaitingTxn => "0%".to_string(),
            JobState::Finished => "100%".to_string(),
            JobState::Running | JobState::Cancelled if self.tasks.is_empty() => "0%".to_string(),
            JobState::Running | JobState::Cancelled => {
                format!("{}/{}", self.finished_tasks(), self.tasks.len())
            }
        };
        AlterJobStatus {
            job_id: self.job_id,
            table_name: self.table_name.clone(),
            create_time: self.created_at,
            finish_time: self.finished_at,
            state: self.state,
            progress,
            error: self.error.clone(),
        }
    }
}

/// Job status row returned by `show_alter_jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterJobStatus {
    /// Job identifier.
    pub job_id: JobId,
    /// Table name.
    pub table_name: String,
    /// Submission time.
    pub create_time: Timestamp,
    /// Terminal transition time.
    pub finish_time: Option<Timestamp>,
    /// Lifecycle state.
    pub state: JobState,
    /// Finished shards over total shards, or a percentage.
    pub progress: String,
    /// Failure or cancellation reason.
    pub error: Option<String>,
}

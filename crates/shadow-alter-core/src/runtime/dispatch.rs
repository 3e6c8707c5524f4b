// crates/shadow-alter-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Conversion Task Dispatch
// Description: Bounded worker pool executing shard backfill assignments.
// Purpose: Convert historical rows into shadows off the coordinator thread.
// Dependencies: crate::core, crate::interfaces, std::thread
// ============================================================================

//! ## Overview
//! [`WorkerPoolRunner`] owns a fixed set of named worker threads that pull
//! assignments from one bounded queue. Each assignment runs
//! [`run_conversion_task`]: the original is scanned up to the watermark,
//! converted in batches, and written into the shadow. Batches are split
//! across scoped threads for conversion; writes stay in scan order.
//!
//! Workers never touch job state. They report through the assignment's
//! channel and the coordinator decides what a report means.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::thread;

use crate::core::codec::encode_row;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::DigestBuilder;
use crate::core::identifiers::StorageVersion;
use crate::core::value::VersionedRow;
use crate::interfaces::DispatchError;
use crate::interfaces::ShardStorage;
use crate::interfaces::TaskAssignment;
use crate::interfaces::TaskReport;
use crate::interfaces::TaskReportKind;
use crate::interfaces::TaskRunner;
use crate::runtime::convert::ConversionError;
use crate::runtime::convert::ConversionPlan;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default worker thread count.
pub const DEFAULT_POOL_SIZE: usize = 4;
/// Default rows per converted batch.
pub const DEFAULT_BATCH_ROWS: usize = 1024;
/// Default conversion threads per batch.
pub const DEFAULT_BATCH_PARALLELISM: usize = 2;
/// Default assignment queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Worker thread count.
    pub pool_size: usize,
    /// Rows per converted batch.
    pub batch_rows: usize,
    /// Conversion threads per batch.
    pub batch_parallelism: usize,
    /// Assignment queue capacity.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            batch_rows: DEFAULT_BATCH_ROWS,
            batch_parallelism: DEFAULT_BATCH_PARALLELISM,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// ============================================================================
// SECTION: Worker Pool
// ============================================================================

/// Thread pool implementation of [`TaskRunner`].
///
/// Dropping the runner closes the queue; workers exit after their current
/// assignment.
pub struct WorkerPoolRunner {
    /// Bounded assignment queue.
    sender: SyncSender<TaskAssignment>,
}

impl WorkerPoolRunner {
    /// Spawns `config.pool_size` workers over `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Rejected`] when the configuration is invalid
    /// or a worker thread cannot be spawned.
    pub fn new<S>(storage: Arc<S>, config: WorkerConfig) -> Result<Self, DispatchError>
    where
        S: ShardStorage + 'static,
    {
        if config.pool_size == 0 || config.batch_rows == 0 || config.batch_parallelism == 0 {
            return Err(DispatchError::Rejected(
                "pool_size, batch_rows, and batch_parallelism must be positive".to_string(),
            ));
        }
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        for index in 0 .. config.pool_size {
            let storage = Arc::clone(&storage);
            let receiver = Arc::clone(&receiver);
            thread::Builder::new()
                .name(format!("shadow-alter-worker-{index}"))
                .spawn(move || worker_loop(storage.as_ref(), &receiver, &config))
                .map_err(|err| {
                    DispatchError::Rejected(format!("failed to spawn worker thread: {err}"))
                })?;
        }
        Ok(Self {
            sender,
        })
    }
}

impl TaskRunner for WorkerPoolRunner {
    fn submit(&self, assignment: TaskAssignment) -> Result<(), DispatchError> {
        self.sender.try_send(assignment).map_err(|err| match err {
            TrySendError::Full(_) => DispatchError::Rejected("worker queue is full".to_string()),
            TrySendError::Disconnected(_) => DispatchError::Closed,
        })
    }
}

/// Runner that executes each assignment on the submitting thread.
///
/// Reports are queued on the assignment channel before `submit` returns,
/// which makes job progress deterministic across ticks.
pub struct InlineTaskRunner<S> {
    /// Storage shared with the coordinator.
    storage: S,
    /// Batch sizing.
    config: WorkerConfig,
}

impl<S: ShardStorage> InlineTaskRunner<S> {
    /// Creates an inline runner.
    #[must_use]
    pub const fn new(storage: S, config: WorkerConfig) -> Self {
        Self {
            storage,
            config,
        }
    }
}

impl<S: ShardStorage> TaskRunner for InlineTaskRunner<S> {
    fn submit(&self, assignment: TaskAssignment) -> Result<(), DispatchError> {
        run_conversion_task(&self.storage, &assignment, &self.config);
        Ok(())
    }
}

/// Pulls assignments until the queue closes.
fn worker_loop<S: ShardStorage + ?Sized>(
    storage: &S,
    receiver: &Arc<Mutex<Receiver<TaskAssignment>>>,
    config: &WorkerConfig,
) {
    loop {
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => return,
        };
        let Ok(assignment) = next else {
            return;
        };
        run_conversion_task(storage, &assignment, config);
    }
}

// ============================================================================
// SECTION: Conversion Task
// ============================================================================

/// Runs one backfill attempt and reports its outcome.
///
/// Rows with versions in `(0, watermark]` are converted in scan order. The
/// final report is `Finished`, `Failed`, or `Cancelled`; it is also returned.
pub fn run_conversion_task<S: ShardStorage + ?Sized>(
    storage: &S,
    assignment: &TaskAssignment,
    config: &WorkerConfig,
) -> TaskReportKind {
    let outcome = match backfill(storage, assignment, config) {
        Ok(Some(kind)) | Err(kind) => kind,
        Ok(None) => TaskReportKind::Cancelled,
    };
    send(assignment, outcome.clone());
    outcome
}

/// Backfills the shadow; `Ok(None)` means the cancel flag was observed.
fn backfill<S: ShardStorage + ?Sized>(
    storage: &S,
    assignment: &TaskAssignment,
    config: &WorkerConfig,
) -> Result<Option<TaskReportKind>, TaskReportKind> {
    let failed = |error: String| TaskReportKind::Failed {
        error,
    };
    if assignment.cancel.is_cancelled() {
        return Ok(None);
    }
    let source = storage
        .scan(&assignment.original, StorageVersion::ZERO, assignment.watermark)
        .map_err(|err| failed(err.to_string()))?;
    let mut digest = DigestBuilder::new(DEFAULT_HASH_ALGORITHM);
    let mut rows: u64 = 0;
    for batch in source.chunks(config.batch_rows.max(1)) {
        if assignment.cancel.is_cancelled() {
            return Ok(None);
        }
        let converted = convert_batch(&assignment.plan, batch, config.batch_parallelism)
            .map_err(failed)?;
        for row in &converted {
            digest.update(&encode_row(&row.row));
        }
        rows += u64::try_from(converted.len()).unwrap_or(u64::MAX);
        storage.write(&assignment.shadow, converted).map_err(|err| failed(err.to_string()))?;
        send(
            assignment,
            TaskReportKind::Progress {
                rows,
            },
        );
    }
    Ok(Some(TaskReportKind::Finished {
        rows,
        digest: digest.finish(),
    }))
}

/// Converts a batch across up to `parallelism` scoped threads, keeping order.
fn convert_batch(
    plan: &ConversionPlan,
    batch: &[VersionedRow],
    parallelism: usize,
) -> Result<Vec<VersionedRow>, String> {
    let parallelism = parallelism.clamp(1, batch.len().max(1));
    if parallelism == 1 {
        return convert_slice(plan, batch).map_err(|err| err.to_string());
    }
    let chunk = batch.len().div_ceil(parallelism);
    let parts: Vec<Result<Vec<VersionedRow>, String>> = thread::scope(|scope| {
        let handles: Vec<_> = batch
            .chunks(chunk)
            .map(|slice| scope.spawn(move || convert_slice(plan, slice)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result.map_err(|err| err.to_string()),
                Err(_) => Err("conversion thread panicked".to_string()),
            })
            .collect()
    });
    let mut converted = Vec::with_capacity(batch.len());
    for part in parts {
        converted.extend(part?);
    }
    Ok(converted)
}

/// Converts rows sequentially.
fn convert_slice(
    plan: &ConversionPlan,
    rows: &[VersionedRow],
) -> Result<Vec<VersionedRow>, ConversionError> {
    rows.iter()
        .map(|row| {
            Ok(VersionedRow {
                version: row.version,
                row: plan.convert_row(&row.row)?,
            })
        })
        .collect()
}

/// Sends a report; a closed channel means the coordinator is gone.
fn send(assignment: &TaskAssignment, kind: TaskReportKind) {
    let _ = assignment.reports.send(TaskReport {
        job_id: assignment.job_id,
        shard_id: assignment.shard_id,
        attempt: assignment.attempt,
        kind,
    });
}

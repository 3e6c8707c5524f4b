// crates/shadow-alter-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Schema Change Coordinator
// Description: Job state machine driving shadow builds, backfill, and swaps.
// Purpose: Alter tables online and publish the result atomically.
// Dependencies: crate::core, crate::interfaces, crate::runtime, crate::audit
// ============================================================================

//! ## Overview
//! The coordinator owns the job table. Callers submit alter requests, then
//! drive progress with [`Coordinator::tick`]; every tick drains worker
//! reports, advances each open job as far as it can go without waiting, and
//! archives terminal jobs past the retention window.
//!
//! Job lifecycle: `PENDING -> WAITING_TXN -> RUNNING -> FINISHED`, with
//! `CANCELLED` reachable from every open state. A job is written to the job
//! store before the coordinator acts on a new state, and
//! [`Coordinator::recover`] resumes open jobs from the store alone.
//!
//! Swaps run under the exclusive side of the table lock. Every replica is
//! caught up and swapped, then the target schema is published with
//! compare-and-set. Any failure swaps the finished replicas back, so
//! readers never see a table with mixed layouts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::audit::JobAuditEvent;
use crate::audit::JobAuditSink;
use crate::audit::NoopAuditSink;
use crate::core::identifiers::JobId;
use crate::core::identifiers::ShardId;
use crate::core::identifiers::StorageVersion;
use crate::core::identifiers::TableId;
use crate::core::job::AlterJobStatus;
use crate::core::job::JobState;
use crate::core::job::SchemaChangeJob;
use crate::core::job::ShardConversionTask;
use crate::core::job::TaskStatus;
use crate::core::schema::AlterTableRequest;
use crate::core::schema::SchemaError;
use crate::core::time::Timestamp;
use crate::interfaces::CancelFlag;
use crate::interfaces::CatalogError;
use crate::interfaces::DispatchError;
use crate::interfaces::JobStore;
use crate::interfaces::ShardStorage;
use crate::interfaces::StorageError;
use crate::interfaces::StoreError;
use crate::interfaces::TableCatalog;
use crate::interfaces::TaskAssignment;
use crate::interfaces::TaskReport;
use crate::interfaces::TaskReportKind;
use crate::interfaces::TaskRunner;
use crate::interfaces::TransactionTracker;
use crate::runtime::convert::ConversionError;
use crate::runtime::convert::ConversionPlan;
use crate::runtime::locks::LockError;
use crate::runtime::locks::TableLocks;
use crate::runtime::matrix::IncompatibleTypeError;
use crate::runtime::matrix::plan_alter;
use crate::runtime::shadow;
use crate::runtime::shadow::BuilderError;
use crate::runtime::shadow::ColumnReservations;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default per-attempt task timeout (10 minutes).
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 600_000;
/// Default retry bound per shard task.
pub const DEFAULT_MAX_TASK_RETRIES: u32 = 3;
/// Default job timeout (24 hours).
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 86_400_000;
/// Default retention of terminal jobs (7 days).
pub const DEFAULT_JOB_RETENTION_MS: u64 = 604_800_000;

/// Coordinator timing and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Per-attempt task timeout in milliseconds.
    pub task_timeout_ms: u64,
    /// Retries per shard task after the first attempt.
    pub max_task_retries: u32,
    /// Job timeout in milliseconds, measured from submission.
    pub job_timeout_ms: u64,
    /// Time terminal jobs stay visible before archival.
    pub job_retention_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            max_task_retries: DEFAULT_MAX_TASK_RETRIES,
            job_timeout_ms: DEFAULT_JOB_TIMEOUT_MS,
            job_retention_ms: DEFAULT_JOB_RETENTION_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Coordinator errors.
///
/// Validation errors are returned by [`Coordinator::submit_alter`]. Execution
/// errors cancel the affected job and surface through its status; only job
/// store failures escape [`Coordinator::tick`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlterError {
    /// Request or target schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Column change is not allowed.
    #[error(transparent)]
    Incompatible(#[from] IncompatibleTypeError),
    /// Shadow builder failure or column conflict.
    #[error(transparent)]
    Builder(#[from] BuilderError),
    /// Job store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Conversion plan failure.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Task runner failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Table lock failure.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Shard task exhausted its retries.
    #[error("shard {shard_id} failed after {attempts} attempts: {error}")]
    TaskFailed {
        /// Shard identifier.
        shard_id: ShardId,
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        error: String,
    },
    /// Job ran past its timeout.
    #[error("timeout")]
    Timeout,
    /// Job is not in the job table.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
    /// Job is finished, cancelled, or swapping.
    #[error("job {job_id} can not be cancelled in state {state}")]
    NotCancellable {
        /// Job identifier.
        job_id: JobId,
        /// Current state.
        state: JobState,
    },
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Schema change coordinator.
pub struct Coordinator<C, S, T, J, R> {
    /// Table catalog.
    catalog: C,
    /// Shard storage.
    storage: S,
    /// Write transaction tracker.
    txns: T,
    /// Durable job store.
    store: J,
    /// Backfill task runner.
    runner: R,
    /// Timing and retry settings.
    config: CoordinatorConfig,
    /// Table metadata locks shared with the write path.
    locks: TableLocks,
    /// Audit sink.
    audit: Arc<dyn JobAuditSink>,
    /// Open and recently terminal jobs.
    jobs: BTreeMap<JobId, SchemaChangeJob>,
    /// Column sets of open jobs.
    reservations: ColumnReservations,
    /// Identifier of the next job.
    next_job_id: JobId,
    /// Compiled conversion plans of open jobs.
    plans: BTreeMap<JobId, Arc<ConversionPlan>>,
    /// Cancel flags of dispatched attempts.
    cancels: BTreeMap<(JobId, ShardId), CancelFlag>,
    /// Report sender cloned into assignments.
    reports_tx: Sender<TaskReport>,
    /// Report receiver drained by ticks.
    reports_rx: Receiver<TaskReport>,
}

impl<C, S, T, J, R> Coordinator<C, S, T, J, R>
where
    C: TableCatalog,
    S: ShardStorage,
    T: TransactionTracker,
    J: JobStore,
    R: TaskRunner,
{
    /// Creates a coordinator. Job ids continue after the highest id in the
    /// store; open jobs are not loaded until [`Coordinator::recover`].
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::Store`] when the store cannot be read.
    pub fn new(
        catalog: C,
        storage: S,
        txns: T,
        store: J,
        runner: R,
        config: CoordinatorConfig,
    ) -> Result<Self, AlterError> {
        let next_job_id = store.max_job_id()?.map_or(JobId::new(NonZeroU64::MIN), JobId::next);
        let (reports_tx, reports_rx) = mpsc::channel();
        Ok(Self {
            catalog,
            storage,
            txns,
            store,
            runner,
            config,
            locks: TableLocks::new(),
            audit: Arc::new(NoopAuditSink),
            jobs: BTreeMap::new(),
            reservations: ColumnReservations::new(),
            next_job_id,
            plans: BTreeMap::new(),
            cancels: BTreeMap::new(),
            reports_tx,
            reports_rx,
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn JobAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Shares table locks with the write path.
    #[must_use]
    pub fn with_locks(mut self, locks: TableLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Returns a job from the job table.
    #[must_use]
    pub fn job(&self, job_id: JobId) -> Option<&SchemaChangeJob> {
        self.jobs.get(&job_id)
    }

    /// Returns job status rows, newest first, optionally for one table.
    #[must_use]
    pub fn show_alter_jobs(&self, table_id: Option<TableId>) -> Vec<AlterJobStatus> {
        self.jobs
            .values()
            .rev()
            .filter(|job| table_id.is_none_or(|table| job.table_id == table))
            .map(SchemaChangeJob::status)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------------

    /// Validates an alter request and records a PENDING job.
    ///
    /// Nothing is allocated for rejected requests.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError`] when the table is unknown, the request or target
    /// schema is invalid, a column change is not allowed, an open job on the
    /// table touches the same columns, or the job cannot be persisted.
    pub fn submit_alter(
        &mut self,
        request: &AlterTableRequest,
        now: Timestamp,
    ) -> Result<JobId, AlterError> {
        let result = self.prepare(request, now);
        match &result {
            Ok(job_id) => {
                self.audit.record(&JobAuditEvent::submitted(now, request.table_id, *job_id));
            }
            Err(err) => {
                self.audit.record(&JobAuditEvent::rejected(now, request.table_id, err.to_string()));
            }
        }
        result
    }

    /// Builds, reserves, and persists a job.
    fn prepare(&mut self, request: &AlterTableRequest, now: Timestamp) -> Result<JobId, AlterError> {
        let descriptor = self.catalog.describe(request.table_id)?;
        let origin = descriptor.schema;
        let (target, touched_columns) = origin.apply_alter(request)?;
        let rewrites = plan_alter(&origin, &target)?;
        target.validate()?;
        let plan = ConversionPlan::compile(&origin, &target, &rewrites)?;

        let job_id = self.next_job_id;
        self.reservations.reserve(request.table_id, &touched_columns, job_id)?;
        let job = SchemaChangeJob {
            job_id,
            table_id: origin.table_id,
            table_name: origin.table_name.clone(),
            origin_version: origin.version,
            origin_schema: origin,
            target_schema: target,
            touched_columns,
            state: JobState::Pending,
            watermark_txns: Vec::new(),
            replicas: Vec::new(),
            tasks: Vec::new(),
            created_at: now,
            finished_at: None,
            timeout_ms: self.config.job_timeout_ms,
            swap_pending: false,
            error: None,
        };
        if let Err(err) = self.store.persist(&job) {
            self.reservations.release(job_id);
            return Err(err.into());
        }
        self.next_job_id = job_id.next();
        self.plans.insert(job_id, Arc::new(plan));
        self.jobs.insert(job_id, job);
        Ok(job_id)
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Drains worker reports, advances open jobs, and archives expired ones.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::Store`] when job state cannot be persisted.
    /// Other failures cancel the affected job instead.
    pub fn tick(&mut self, now: Timestamp) -> Result<(), AlterError> {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.apply_report(report)?;
        }
        let open: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| !job.state.is_terminal())
            .map(|job| job.job_id)
            .collect();
        for job_id in open {
            self.advance(job_id, now)?;
        }
        self.archive_expired(now)
    }

    /// Cancels an open job.
    ///
    /// In-flight tasks stop at their next batch boundary and every shadow is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::UnknownJob`], [`AlterError::NotCancellable`] once
    /// the job is terminal or swapping, or [`AlterError::Store`].
    pub fn cancel(&mut self, job_id: JobId, now: Timestamp) -> Result<(), AlterError> {
        let mut job = self.jobs.remove(&job_id).ok_or(AlterError::UnknownJob(job_id))?;
        let result = if job.state.is_terminal() || job.swap_pending {
            Err(AlterError::NotCancellable {
                job_id,
                state: job.state,
            })
        } else {
            self.fail_job(&mut job, "cancelled by user".to_string(), now)
        };
        self.jobs.insert(job_id, job);
        result
    }

    /// Loads open jobs from the store and prepares them to resume.
    ///
    /// PENDING jobs drop any recorded shadows and allocate again on the next
    /// tick. RUNNING jobs keep finished shards and rebuild the others on
    /// fresh shadows. Jobs that were swapping finish the swap on the next
    /// tick. Returns the number of jobs loaded.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::Store`] when the store cannot be read or written.
    pub fn recover(&mut self, now: Timestamp) -> Result<usize, AlterError> {
        let pending = self.store.load_pending()?;
        let count = pending.len();
        for mut job in pending {
            let job_id = job.job_id;
            if job_id >= self.next_job_id {
                self.next_job_id = job_id.next();
            }
            if self.jobs.contains_key(&job_id) {
                continue;
            }
            let result = self.resume(&mut job);
            let outcome = self.settle(&mut job, result, now);
            self.jobs.insert(job_id, job);
            outcome?;
        }
        Ok(count)
    }

    /// Restores runtime state for one recovered job.
    fn resume(&mut self, job: &mut SchemaChangeJob) -> Result<(), AlterError> {
        self.reservations.reserve(job.table_id, &job.touched_columns, job.job_id)?;
        self.plan_for(job)?;
        match job.state {
            JobState::Pending => {
                shadow::discard(&self.storage, job)?;
                job.replicas.clear();
                job.tasks.clear();
                self.store.persist(job)?;
            }
            JobState::Running if !job.swap_pending => {
                for index in 0 .. job.tasks.len() {
                    if job.tasks[index].status != TaskStatus::Finished {
                        self.rebuild_task(job, index)?;
                    }
                }
                self.store.persist(job)?;
            }
            JobState::WaitingTxn
            | JobState::Running
            | JobState::Finished
            | JobState::Cancelled => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // State Steps
    // ------------------------------------------------------------------------

    /// Advances one job until it waits or ends.
    fn advance(&mut self, job_id: JobId, now: Timestamp) -> Result<(), AlterError> {
        let Some(mut job) = self.jobs.remove(&job_id) else {
            return Ok(());
        };
        let result = self.step_until_blocked(&mut job, now);
        let outcome = self.settle(&mut job, result, now);
        self.jobs.insert(job_id, job);
        outcome
    }

    /// Runs state steps while the state keeps changing.
    fn step_until_blocked(
        &mut self,
        job: &mut SchemaChangeJob,
        now: Timestamp,
    ) -> Result<(), AlterError> {
        loop {
            let before = job.state;
            self.step(job, now)?;
            if job.state == before || job.state.is_terminal() {
                return Ok(());
            }
        }
    }

    /// Cancels the job for execution errors; store errors propagate.
    fn settle(
        &mut self,
        job: &mut SchemaChangeJob,
        result: Result<(), AlterError>,
        now: Timestamp,
    ) -> Result<(), AlterError> {
        match result {
            Ok(()) => Ok(()),
            Err(AlterError::Store(err)) => Err(AlterError::Store(err)),
            Err(err) if job.state.is_terminal() => Err(err),
            Err(err) => self.fail_job(job, err.to_string(), now),
        }
    }

    /// Runs the step of the current state.
    fn step(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        if job.swap_pending {
            return self.swap(job, now);
        }
        if now.millis_since(job.created_at) > job.timeout_ms {
            return Err(AlterError::Timeout);
        }
        self.ensure_origin_current(job)?;
        match job.state {
            JobState::Pending => self.step_pending(job, now),
            JobState::WaitingTxn => self.step_waiting(job, now),
            JobState::Running => self.step_running(job, now),
            JobState::Finished | JobState::Cancelled => Ok(()),
        }
    }

    /// Fails when another job published over the origin schema.
    fn ensure_origin_current(&self, job: &SchemaChangeJob) -> Result<(), AlterError> {
        let actual = self.catalog.describe(job.table_id)?.schema.version;
        if actual == job.origin_version {
            return Ok(());
        }
        Err(CatalogError::VersionConflict {
            table_id: job.table_id,
            expected: job.origin_version,
            actual,
        }
        .into())
    }

    /// PENDING: allocate shadows and fix the watermark transaction set.
    ///
    /// The replica mapping is persisted before the watermark transaction set
    /// is taken; recovery drops recorded shadows of PENDING jobs.
    fn step_pending(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        if job.replicas.is_empty() {
            let descriptor = self.catalog.describe(job.table_id)?;
            let allocated = shadow::allocate(&self.storage, job, &descriptor.shards)
                .map_err(AlterError::from)
                .and_then(|()| self.store.persist(job).map_err(AlterError::from));
            if let Err(err) = allocated {
                self.discard_shadows(job, now);
                job.replicas.clear();
                return Err(err);
            }
        }
        job.watermark_txns = self.txns.active_transactions(job.table_id)?;
        self.transition(job, JobState::WaitingTxn, now)
    }

    /// WAITING_TXN: once earlier writes resolve, fix watermarks and dispatch.
    fn step_waiting(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        for txn_id in &job.watermark_txns {
            if !self.txns.is_resolved(*txn_id)? {
                return Ok(());
            }
        }
        let mut tasks = Vec::with_capacity(job.replicas.len());
        for replica in &mut job.replicas {
            replica.watermark_version = Some(self.storage.visible_version(&replica.original)?);
            replica.applied_version = StorageVersion::ZERO;
            tasks.push(ShardConversionTask {
                shard_id: replica.shard_id,
                original: replica.original.clone(),
                shadow: replica.shadow.clone(),
                status: TaskStatus::Created,
                rows_converted: 0,
                attempts: 0,
                started_at: None,
                last_error: None,
                digest: None,
            });
        }
        job.tasks = tasks;
        self.transition(job, JobState::Running, now)?;
        self.dispatch_created(job, now)
    }

    /// RUNNING: retry, replay, and swap once every shard is backfilled.
    fn step_running(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        for index in 0 .. job.tasks.len() {
            let task = &mut job.tasks[index];
            let expired = task.status == TaskStatus::Running
                && task
                    .started_at
                    .is_some_and(|started| now.millis_since(started) > self.config.task_timeout_ms);
            if expired {
                if let Some(flag) = self.cancels.remove(&(job.job_id, task.shard_id)) {
                    flag.cancel();
                }
                task.status = TaskStatus::Failed;
                task.last_error = Some("task timeout".to_string());
            }
            if job.tasks[index].status == TaskStatus::Failed {
                self.retry_task(job, index, now)?;
            }
        }
        self.dispatch_created(job, now)?;

        let plan = self.plan_for(job)?;
        for replica in &mut job.replicas {
            let finished = job
                .tasks
                .iter()
                .any(|task| task.shard_id == replica.shard_id && task.status == TaskStatus::Finished);
            if finished {
                shadow::catch_up(&self.storage, &plan, replica)?;
            }
        }
        if job.tasks.iter().all(|task| task.status == TaskStatus::Finished) {
            job.swap_pending = true;
            self.store.persist(job)?;
            return self.swap(job, now);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Dispatches every CREATED task as a new attempt.
    fn dispatch_created(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        let plan = self.plan_for(job)?;
        let mut assignments = Vec::new();
        for task in &mut job.tasks {
            if task.status != TaskStatus::Created {
                continue;
            }
            let watermark = job
                .replicas
                .iter()
                .find(|replica| replica.shard_id == task.shard_id)
                .and_then(|replica| replica.watermark_version)
                .unwrap_or(StorageVersion::ZERO);
            let cancel = CancelFlag::new();
            self.cancels.insert((job.job_id, task.shard_id), cancel.clone());
            task.attempts += 1;
            task.status = TaskStatus::Running;
            task.started_at = Some(now);
            task.rows_converted = 0;
            task.digest = None;
            assignments.push(TaskAssignment {
                job_id: job.job_id,
                shard_id: task.shard_id,
                attempt: task.attempts,
                original: task.original.clone(),
                shadow: task.shadow.clone(),
                watermark,
                plan: Arc::clone(&plan),
                cancel,
                reports: self.reports_tx.clone(),
            });
        }
        if assignments.is_empty() {
            return Ok(());
        }
        self.store.persist(job)?;
        for assignment in assignments {
            self.runner.submit(assignment)?;
        }
        Ok(())
    }

    /// Re-creates a failed task on a fresh shadow, or fails the job once the
    /// retry bound is reached.
    fn retry_task(
        &mut self,
        job: &mut SchemaChangeJob,
        index: usize,
        now: Timestamp,
    ) -> Result<(), AlterError> {
        let task = &job.tasks[index];
        let error = task.last_error.clone().unwrap_or_default();
        if task.attempts > self.config.max_task_retries {
            return Err(AlterError::TaskFailed {
                shard_id: task.shard_id,
                attempts: task.attempts,
                error,
            });
        }
        let (shard_id, attempt) = (task.shard_id, task.attempts + 1);
        self.rebuild_task(job, index)?;
        self.audit.record(&JobAuditEvent::task_retry(
            now,
            job.table_id,
            job.job_id,
            shard_id,
            attempt,
            error,
        ));
        Ok(())
    }

    /// Points a task at a fresh shadow and marks it CREATED.
    fn rebuild_task(&mut self, job: &mut SchemaChangeJob, index: usize) -> Result<(), AlterError> {
        let Some(task) = job.tasks.get_mut(index) else {
            return Ok(());
        };
        let Some(replica) =
            job.replicas.iter_mut().find(|replica| replica.shard_id == task.shard_id)
        else {
            return Ok(());
        };
        shadow::reallocate(&self.storage, replica, &job.target_schema)?;
        task.shadow = replica.shadow.clone();
        task.status = TaskStatus::Created;
        task.rows_converted = 0;
        task.started_at = None;
        task.digest = None;
        Ok(())
    }

    /// Applies one worker report; stale attempts are ignored.
    fn apply_report(&mut self, report: TaskReport) -> Result<(), AlterError> {
        let Some(job) = self.jobs.get_mut(&report.job_id) else {
            return Ok(());
        };
        if job.state != JobState::Running || job.swap_pending {
            return Ok(());
        }
        let watermark = job.replica(report.shard_id).and_then(|replica| replica.watermark_version);
        let Some(task) = job.tasks.iter_mut().find(|task| task.shard_id == report.shard_id) else {
            return Ok(());
        };
        if task.attempts != report.attempt || task.status != TaskStatus::Running {
            return Ok(());
        }
        match report.kind {
            TaskReportKind::Progress {
                rows,
            } => {
                task.rows_converted = rows;
                return Ok(());
            }
            TaskReportKind::Finished {
                rows,
                digest,
            } => {
                task.status = TaskStatus::Finished;
                task.rows_converted = rows;
                task.digest = Some(digest);
                if let Some(replica) =
                    job.replicas.iter_mut().find(|replica| replica.shard_id == report.shard_id)
                {
                    replica.applied_version = watermark.unwrap_or(StorageVersion::ZERO);
                }
            }
            TaskReportKind::Failed {
                error,
            } => {
                task.status = TaskStatus::Failed;
                task.last_error = Some(error);
            }
            TaskReportKind::Cancelled => {
                task.status = TaskStatus::Failed;
                task.last_error = Some("task cancelled".to_string());
            }
        }
        self.cancels.remove(&(report.job_id, report.shard_id));
        self.store.persist(job)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Swap
    // ------------------------------------------------------------------------

    /// Swaps every replica and publishes the target schema, then finishes.
    ///
    /// Safe to repeat after a crash: replicas already serving the target
    /// version are skipped and an already published schema is not published
    /// again.
    fn swap(&mut self, job: &mut SchemaChangeJob, now: Timestamp) -> Result<(), AlterError> {
        let plan = self.plan_for(job)?;
        let table_id = job.table_id;
        self.locks.with_exclusive(table_id, || self.swap_locked(job, &plan))??;
        self.transition(job, JobState::Finished, now)?;
        self.discard_shadows(job, now);
        self.release(job.job_id);
        Ok(())
    }

    /// Catches up, swaps, and publishes under the exclusive table lock.
    fn swap_locked(&self, job: &mut SchemaChangeJob, plan: &ConversionPlan) -> Result<(), AlterError> {
        let published = self.catalog.describe(job.table_id)?.schema;
        if published == job.target_schema {
            return Ok(());
        }
        if published.version != job.origin_version {
            return Err(CatalogError::VersionConflict {
                table_id: job.table_id,
                expected: job.origin_version,
                actual: published.version,
            }
            .into());
        }
        let target_version = job.target_schema.version;
        for index in 0 .. job.replicas.len() {
            let replica = &mut job.replicas[index];
            let result = match self.storage.schema_version(&replica.original) {
                Ok(version) if version == target_version => continue,
                Ok(_) => shadow::catch_up(&self.storage, plan, replica)
                    .map_err(AlterError::from)
                    .and_then(|_| {
                        self.storage
                            .swap(&replica.original, &replica.shadow)
                            .map_err(AlterError::from)
                    }),
                Err(err) => Err(err.into()),
            };
            if let Err(err) = result {
                self.rollback_swaps(job);
                return Err(err);
            }
        }
        if let Err(err) =
            self.catalog.publish(job.table_id, job.origin_version, job.target_schema.clone())
        {
            self.rollback_swaps(job);
            return Err(err.into());
        }
        Ok(())
    }

    /// Swaps back every replica whose original serves the target layout.
    fn rollback_swaps(&self, job: &SchemaChangeJob) {
        for replica in &job.replicas {
            if self.storage.schema_version(&replica.original).ok()
                == Some(job.target_schema.version)
            {
                let _ = self.storage.swap(&replica.original, &replica.shadow);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Terminal Handling
    // ------------------------------------------------------------------------

    /// Cancels a job with an error and drops its shadows.
    fn fail_job(
        &mut self,
        job: &mut SchemaChangeJob,
        error: String,
        now: Timestamp,
    ) -> Result<(), AlterError> {
        for task in &job.tasks {
            if let Some(flag) = self.cancels.remove(&(job.job_id, task.shard_id)) {
                flag.cancel();
            }
        }
        if job.swap_pending {
            let published =
                self.catalog.describe(job.table_id).is_ok_and(|d| d.schema == job.target_schema);
            if !published {
                self.rollback_swaps(job);
            }
            job.swap_pending = false;
        }
        job.error = Some(error);
        self.transition(job, JobState::Cancelled, now)?;
        self.discard_shadows(job, now);
        self.release(job.job_id);
        Ok(())
    }

    /// Drops every shadow of a job; failed drops are audited.
    fn discard_shadows(&self, job: &SchemaChangeJob, now: Timestamp) {
        if let Err(err) = shadow::discard(&self.storage, job) {
            self.audit.record(&JobAuditEvent::discard_failed(
                now,
                job.table_id,
                job.job_id,
                err.to_string(),
            ));
        }
    }

    /// Drops runtime state held for a terminal job.
    fn release(&mut self, job_id: JobId) {
        self.reservations.release(job_id);
        self.plans.remove(&job_id);
        self.cancels.retain(|(holder, _), _| *holder != job_id);
    }

    /// Archives terminal jobs past the retention window.
    fn archive_expired(&mut self, now: Timestamp) -> Result<(), AlterError> {
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| {
                job.state.is_terminal()
                    && job
                        .finished_at
                        .is_some_and(|finished| now.millis_since(finished) >= self.config.job_retention_ms)
            })
            .map(|job| job.job_id)
            .collect();
        for job_id in expired {
            self.store.archive(job_id)?;
            if let Some(job) = self.jobs.remove(&job_id) {
                self.audit.record(&JobAuditEvent::archived(now, job.table_id, job_id, job.state));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Persists a state change and records it.
    fn transition(
        &self,
        job: &mut SchemaChangeJob,
        next: JobState,
        now: Timestamp,
    ) -> Result<(), AlterError> {
        let from = job.state;
        job.state = next;
        if next.is_terminal() {
            job.finished_at = Some(now);
        }
        self.store.persist(job)?;
        self.audit.record(&JobAuditEvent::transition(
            now,
            job.table_id,
            job.job_id,
            from,
            next,
            job.error.clone(),
        ));
        Ok(())
    }

    /// Returns the cached conversion plan of a job, compiling it on demand.
    fn plan_for(&mut self, job: &SchemaChangeJob) -> Result<Arc<ConversionPlan>, AlterError> {
        if let Some(plan) = self.plans.get(&job.job_id) {
            return Ok(Arc::clone(plan));
        }
        let rewrites = plan_alter(&job.origin_schema, &job.target_schema)?;
        let plan =
            Arc::new(ConversionPlan::compile(&job.origin_schema, &job.target_schema, &rewrites)?);
        self.plans.insert(job.job_id, Arc::clone(&plan));
        Ok(plan)
    }
}

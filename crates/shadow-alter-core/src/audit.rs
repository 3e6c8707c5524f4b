// crates/shadow-alter-core/src/audit.rs
// ============================================================================
// Module: Shadow Alter Audit Logging
// Description: Structured audit events for schema change jobs.
// Purpose: Emit JSON-line job transitions without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The coordinator reports every rejected request, accepted job, state
//! transition, task retry, archival, and failed shadow drop through a
//! [`JobAuditSink`]. Sinks
//! serialize one JSON object per line; write failures are ignored so audit
//! output never blocks a job.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::identifiers::JobId;
use crate::core::identifiers::ShardId;
use crate::core::identifiers::TableId;
use crate::core::job::JobState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Job audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobAuditEvent {
    /// Event identifier (`alter_rejected`, `job_submitted`, `job_transition`,
    /// `task_retry`, `job_archived`, `shadow_discard_failed`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Table identifier.
    pub table_id: TableId,
    /// Job identifier when a job exists.
    pub job_id: Option<JobId>,
    /// Shard identifier for task-level events.
    pub shard_id: Option<ShardId>,
    /// Previous state for transitions.
    pub from_state: Option<JobState>,
    /// Current state.
    pub state: Option<JobState>,
    /// Attempt number for task-level events.
    pub attempt: Option<u32>,
    /// Error or rejection message.
    pub message: Option<String>,
}

impl JobAuditEvent {
    /// Builds an `alter_rejected` event.
    #[must_use]
    pub fn rejected(now: Timestamp, table_id: TableId, message: String) -> Self {
        Self::base("alter_rejected", now, table_id).with_message(Some(message))
    }

    /// Builds a `job_submitted` event.
    #[must_use]
    pub fn submitted(now: Timestamp, table_id: TableId, job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            state: Some(JobState::Pending),
            ..Self::base("job_submitted", now, table_id)
        }
    }

    /// Builds a `job_transition` event.
    #[must_use]
    pub fn transition(
        now: Timestamp,
        table_id: TableId,
        job_id: JobId,
        from: JobState,
        to: JobState,
        message: Option<String>,
    ) -> Self {
        Self {
            job_id: Some(job_id),
            from_state: Some(from),
            state: Some(to),
            ..Self::base("job_transition", now, table_id)
        }
        .with_message(message)
    }

    /// Builds a `task_retry` event.
    #[must_use]
    pub fn task_retry(
        now: Timestamp,
        table_id: TableId,
        job_id: JobId,
        shard_id: ShardId,
        attempt: u32,
        message: String,
    ) -> Self {
        Self {
            job_id: Some(job_id),
            shard_id: Some(shard_id),
            attempt: Some(attempt),
            ..Self::base("task_retry", now, table_id)
        }
        .with_message(Some(message))
    }

    /// Builds a `job_archived` event.
    #[must_use]
    pub fn archived(now: Timestamp, table_id: TableId, job_id: JobId, state: JobState) -> Self {
        Self {
            job_id: Some(job_id),
            state: Some(state),
            ..Self::base("job_archived", now, table_id)
        }
    }

    /// Builds a `shadow_discard_failed` event.
    #[must_use]
    pub fn discard_failed(now: Timestamp, table_id: TableId, job_id: JobId, message: String) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::base("shadow_discard_failed", now, table_id)
        }
        .with_message(Some(message))
    }

    /// Returns an event with every optional field cleared.
    const fn base(event: &'static str, now: Timestamp, table_id: TableId) -> Self {
        Self {
            event,
            timestamp_ms: now.as_unix_millis(),
            table_id,
            job_id: None,
            shard_id: None,
            from_state: None,
            state: None,
            attempt: None,
            message: None,
        }
    }

    /// Sets the message.
    fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for job events.
pub trait JobAuditSink: Send + Sync {
    /// Record a job audit event.
    fn record(&self, event: &JobAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl JobAuditSink for StderrAuditSink {
    fn record(&self, event: &JobAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle guarded for concurrent writes.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl JobAuditSink for FileAuditSink {
    fn record(&self, event: &JobAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl JobAuditSink for NoopAuditSink {
    fn record(&self, _event: &JobAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<JobAuditEvent>>,
}

impl RecordingAuditSink {
    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<JobAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl JobAuditSink for RecordingAuditSink {
    fn record(&self, event: &JobAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

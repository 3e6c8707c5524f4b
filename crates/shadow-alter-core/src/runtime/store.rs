// crates/shadow-alter-core/src/runtime/store.rs
// ============================================================================
// Module: Shadow Alter In-Memory Job Store
// Description: In-memory job store and shared trait-object wrapper.
// Purpose: Provide a deterministic job store for tests and local runs.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryJobStore`] keeps the latest snapshot of every job. Clones share
//! state, so a test can drop a coordinator and start a new one over the same
//! store to exercise recovery. [`SharedJobStore`] wraps any store as a trait
//! object so hosts can pick a backend from configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::identifiers::JobId;
use crate::core::identifiers::TableId;
use crate::core::job::SchemaChangeJob;
use crate::interfaces::JobStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory job store for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryJobStore {
    /// Job map protected by a mutex.
    jobs: Arc<Mutex<BTreeMap<JobId, SchemaChangeJob>>>,
    /// Highest job id ever persisted, kept across archival.
    max_job_id: Arc<Mutex<Option<JobId>>>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the job map locked.
    fn with_jobs<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<JobId, SchemaChangeJob>) -> R,
    ) -> Result<R, StoreError> {
        let mut guard =
            self.jobs.lock().map_err(|_| StoreError::Io("job store mutex poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl JobStore for InMemoryJobStore {
    fn persist(&self, job: &SchemaChangeJob) -> Result<(), StoreError> {
        self.with_jobs(|jobs| jobs.insert(job.job_id, job.clone()))?;
        let mut max = self
            .max_job_id
            .lock()
            .map_err(|_| StoreError::Io("job store mutex poisoned".to_string()))?;
        if max.is_none_or(|current| current < job.job_id) {
            *max = Some(job.job_id);
        }
        Ok(())
    }

    fn load(&self, job_id: JobId) -> Result<Option<SchemaChangeJob>, StoreError> {
        self.with_jobs(|jobs| jobs.get(&job_id).cloned())
    }

    fn load_pending(&self) -> Result<Vec<SchemaChangeJob>, StoreError> {
        self.with_jobs(|jobs| jobs.values().filter(|job| !job.state.is_terminal()).cloned().collect())
    }

    fn list(&self, table_id: Option<TableId>) -> Result<Vec<SchemaChangeJob>, StoreError> {
        self.with_jobs(|jobs| {
            jobs.values()
                .filter(|job| table_id.is_none_or(|table_id| job.table_id == table_id))
                .cloned()
                .collect()
        })
    }

    fn archive(&self, job_id: JobId) -> Result<(), StoreError> {
        self.with_jobs(|jobs| jobs.remove(&job_id))?;
        Ok(())
    }

    fn max_job_id(&self) -> Result<Option<JobId>, StoreError> {
        self.max_job_id
            .lock()
            .map(|max| *max)
            .map_err(|_| StoreError::Io("job store mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared job store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedJobStore {
    /// Inner store implementation.
    inner: Arc<dyn JobStore + Send + Sync>,
}

impl SharedJobStore {
    /// Wraps a store implementation.
    #[must_use]
    pub fn from_store(store: impl JobStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn JobStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl JobStore for SharedJobStore {
    fn persist(&self, job: &SchemaChangeJob) -> Result<(), StoreError> {
        self.inner.persist(job)
    }

    fn load(&self, job_id: JobId) -> Result<Option<SchemaChangeJob>, StoreError> {
        self.inner.load(job_id)
    }

    fn load_pending(&self) -> Result<Vec<SchemaChangeJob>, StoreError> {
        self.inner.load_pending()
    }

    fn list(&self, table_id: Option<TableId>) -> Result<Vec<SchemaChangeJob>, StoreError> {
        self.inner.list(table_id)
    }

    fn archive(&self, job_id: JobId) -> Result<(), StoreError> {
        self.inner.archive(job_id)
    }

    fn max_job_id(&self) -> Result<Option<JobId>, StoreError> {
        self.inner.max_job_id()
    }
}

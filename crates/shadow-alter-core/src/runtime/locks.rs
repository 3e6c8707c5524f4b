// crates/shadow-alter-core/src/runtime/locks.rs
// ============================================================================
// Module: Table Metadata Locks
// Description: Per-table reader/writer locks shared by writers and the coordinator.
// Purpose: Make the shard swap and schema publish atomic to readers and writers.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Loads and reads hold the shared side of a table lock for the duration of
//! one statement. The coordinator holds the exclusive side only while it
//! performs the final catch-up, swaps shards, and publishes the new schema.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::identifiers::TableId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lock acquisition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// A holder panicked while holding the lock.
    #[error("table lock poisoned for table {0}")]
    Poisoned(TableId),
}

// ============================================================================
// SECTION: Lock Table
// ============================================================================

/// Per-table lock registry; clones share locks.
#[derive(Debug, Default, Clone)]
pub struct TableLocks {
    /// Lock per table, created on first use.
    locks: Arc<Mutex<BTreeMap<TableId, Arc<RwLock<()>>>>>,
}

impl TableLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a table.
    fn lock_for(&self, table_id: TableId) -> Result<Arc<RwLock<()>>, LockError> {
        let mut locks = self.locks.lock().map_err(|_| LockError::Poisoned(table_id))?;
        Ok(Arc::clone(locks.entry(table_id).or_default()))
    }

    /// Runs `f` holding the shared side of the table lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] when the lock is poisoned.
    pub fn with_shared<R>(&self, table_id: TableId, f: impl FnOnce() -> R) -> Result<R, LockError> {
        let lock = self.lock_for(table_id)?;
        let _guard = lock.read().map_err(|_| LockError::Poisoned(table_id))?;
        Ok(f())
    }

    /// Runs `f` holding the exclusive side of the table lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] when the lock is poisoned.
    pub fn with_exclusive<R>(
        &self,
        table_id: TableId,
        f: impl FnOnce() -> R,
    ) -> Result<R, LockError> {
        let lock = self.lock_for(table_id)?;
        let _guard = lock.write().map_err(|_| LockError::Poisoned(table_id))?;
        Ok(f())
    }
}

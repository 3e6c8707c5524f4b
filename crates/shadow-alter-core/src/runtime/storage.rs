// crates/shadow-alter-core/src/runtime/storage.rs
// ============================================================================
// Module: Shadow Alter In-Memory Shard Storage
// Description: Versioned in-memory storage units with fault injection.
// Purpose: Back local runs and tests with a deterministic storage layer.
// Dependencies: crate::core, crate::interfaces, crate::runtime::aggregate
// ============================================================================

//! ## Overview
//! Each storage unit holds a schema and an append-only list of rows tagged
//! with the version of the load that wrote them. Versions come from one
//! counter shared by every unit, so rows of different shards can be merged
//! in commit order. Fault injection hooks let tests fail scans and swaps on
//! specific handles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::StorageHandle;
use crate::core::identifiers::StorageVersion;
use crate::core::schema::TableSchema;
use crate::core::value::Row;
use crate::core::value::VersionedRow;
use crate::interfaces::ShardStorage;
use crate::interfaces::StorageError;
use crate::runtime::aggregate::merge_rows;

// ============================================================================
// SECTION: State
// ============================================================================

/// One storage unit.
#[derive(Debug, Clone)]
struct StorageUnit {
    /// Layout of the stored rows.
    schema: TableSchema,
    /// Rows in write order.
    rows: Vec<VersionedRow>,
    /// Highest committed version.
    visible: StorageVersion,
}

/// Injected failures.
#[derive(Debug, Default)]
struct Faults {
    /// Remaining scan failures per handle.
    scans: BTreeMap<StorageHandle, u32>,
    /// Handles whose next swap fails.
    swaps: BTreeSet<StorageHandle>,
    /// Handles whose next discard fails.
    discards: BTreeSet<StorageHandle>,
}

/// Shared storage state.
#[derive(Debug, Default)]
struct StorageState {
    /// Units by handle.
    units: BTreeMap<StorageHandle, StorageUnit>,
    /// Counter for handle names.
    next_unit: u64,
    /// Last issued storage version; versions are ordered across all units.
    last_version: StorageVersion,
    /// Injected failures.
    faults: Faults,
}

impl StorageState {
    /// Returns a unit or [`StorageError::UnknownHandle`].
    fn unit(&self, handle: &StorageHandle) -> Result<&StorageUnit, StorageError> {
        self.units.get(handle).ok_or_else(|| StorageError::UnknownHandle(handle.to_string()))
    }

    /// Returns a mutable unit or [`StorageError::UnknownHandle`].
    fn unit_mut(&mut self, handle: &StorageHandle) -> Result<&mut StorageUnit, StorageError> {
        self.units.get_mut(handle).ok_or_else(|| StorageError::UnknownHandle(handle.to_string()))
    }

    /// Creates an empty unit.
    fn create(&mut self, schema: &TableSchema) -> StorageHandle {
        self.next_unit += 1;
        let handle = StorageHandle::new(format!("unit-{}", self.next_unit));
        self.units.insert(
            handle.clone(),
            StorageUnit {
                schema: schema.clone(),
                rows: Vec::new(),
                visible: StorageVersion::ZERO,
            },
        );
        handle
    }
}

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// In-memory shard storage; clones share state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryShardStorage {
    /// Storage state protected by a mutex.
    state: Arc<Mutex<StorageState>>,
}

impl InMemoryShardStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the storage state.
    fn lock(&self) -> Result<MutexGuard<'_, StorageState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Io("storage mutex poisoned".to_string()))
    }

    /// Creates an empty unit for a table shard.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the state lock is poisoned.
    pub fn create(&self, schema: &TableSchema) -> Result<StorageHandle, StorageError> {
        Ok(self.lock()?.create(schema))
    }

    /// Commits rows as one load and returns its version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invalid`] when a row does not match the unit
    /// width, or [`StorageError::UnknownHandle`].
    pub fn load(&self, handle: &StorageHandle, rows: Vec<Row>) -> Result<StorageVersion, StorageError> {
        let mut state = self.lock()?;
        let version = state.last_version.next();
        let unit = state.unit_mut(handle)?;
        let width = unit.schema.columns.len();
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(StorageError::Invalid(format!(
                "row has {} values but {handle} stores {width} columns",
                row.len()
            )));
        }
        unit.visible = version;
        unit.rows.extend(rows.into_iter().map(|row| VersionedRow {
            version,
            row,
        }));
        state.last_version = version;
        Ok(version)
    }

    /// Returns the merged visible rows of a unit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the handle is unknown or merging fails.
    pub fn read(&self, handle: &StorageHandle) -> Result<Vec<Row>, StorageError> {
        let (schema, rows) = {
            let state = self.lock()?;
            let unit = state.unit(handle)?;
            (unit.schema.clone(), unit.rows.clone())
        };
        merge_rows(&schema, rows).map_err(|err| StorageError::Invalid(err.to_string()))
    }

    /// Returns the schema a unit is laid out for.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownHandle`] for unknown handles.
    pub fn schema(&self, handle: &StorageHandle) -> Result<TableSchema, StorageError> {
        Ok(self.lock()?.unit(handle)?.schema.clone())
    }

    /// Returns every live handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the state lock is poisoned.
    pub fn handles(&self) -> Result<Vec<StorageHandle>, StorageError> {
        Ok(self.lock()?.units.keys().cloned().collect())
    }

    /// Makes the next `count` scans of `handle` fail.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the state lock is poisoned.
    pub fn fail_scans(&self, handle: &StorageHandle, count: u32) -> Result<(), StorageError> {
        self.lock()?.faults.scans.insert(handle.clone(), count);
        Ok(())
    }

    /// Makes the next swap whose original is `handle` fail.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the state lock is poisoned.
    pub fn fail_swap(&self, handle: &StorageHandle) -> Result<(), StorageError> {
        self.lock()?.faults.swaps.insert(handle.clone());
        Ok(())
    }

    /// Makes the next discard of `handle` fail.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the state lock is poisoned.
    pub fn fail_discard(&self, handle: &StorageHandle) -> Result<(), StorageError> {
        self.lock()?.faults.discards.insert(handle.clone());
        Ok(())
    }
}

impl ShardStorage for InMemoryShardStorage {
    fn allocate_shadow(
        &self,
        original: &StorageHandle,
        schema: &TableSchema,
    ) -> Result<StorageHandle, StorageError> {
        let mut state = self.lock()?;
        state.unit(original)?;
        Ok(state.create(schema))
    }

    fn visible_version(&self, handle: &StorageHandle) -> Result<StorageVersion, StorageError> {
        Ok(self.lock()?.unit(handle)?.visible)
    }

    fn scan(
        &self,
        handle: &StorageHandle,
        after: StorageVersion,
        upto: StorageVersion,
    ) -> Result<Vec<VersionedRow>, StorageError> {
        let mut state = self.lock()?;
        if let Some(remaining) = state.faults.scans.get_mut(handle)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StorageError::Io(format!("injected scan failure on {handle}")));
        }
        let unit = state.unit(handle)?;
        Ok(unit
            .rows
            .iter()
            .filter(|row| row.version > after && row.version <= upto)
            .cloned()
            .collect())
    }

    fn write(&self, handle: &StorageHandle, rows: Vec<VersionedRow>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let unit = state.unit_mut(handle)?;
        let width = unit.schema.columns.len();
        if let Some(row) = rows.iter().find(|row| row.row.len() != width) {
            return Err(StorageError::Invalid(format!(
                "row has {} values but {handle} stores {width} columns",
                row.row.len()
            )));
        }
        let max = rows.iter().map(|row| row.version).max();
        unit.rows.extend(rows);
        if let Some(max) = max {
            unit.visible = unit.visible.max(max);
            state.last_version = state.last_version.max(max);
        }
        Ok(())
    }

    fn truncate_after(
        &self,
        handle: &StorageHandle,
        after: StorageVersion,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let unit = state.unit_mut(handle)?;
        unit.rows.retain(|row| row.version <= after);
        unit.visible = unit.visible.min(after);
        Ok(())
    }

    fn swap(&self, original: &StorageHandle, shadow: &StorageHandle) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.faults.swaps.remove(original) {
            return Err(StorageError::Io(format!("injected swap failure on {original}")));
        }
        let original_unit = state.unit(original)?.clone();
        let shadow_unit = state.unit(shadow)?.clone();
        state.units.insert(original.clone(), shadow_unit);
        state.units.insert(shadow.clone(), original_unit);
        Ok(())
    }

    fn discard(&self, handle: &StorageHandle) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.faults.discards.remove(handle) {
            return Err(StorageError::Io(format!("injected discard failure on {handle}")));
        }
        state.units.remove(handle);
        Ok(())
    }

    fn schema_version(&self, handle: &StorageHandle) -> Result<SchemaVersion, StorageError> {
        Ok(self.lock()?.unit(handle)?.schema.version)
    }
}

// crates/shadow-alter-core/src/runtime/catalog.rs
// ============================================================================
// Module: Shadow Alter In-Memory Catalog
// Description: In-memory table catalog and write transaction tracker.
// Purpose: Provide deterministic metadata collaborators for tests and local runs.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The catalog publishes schemas with compare-and-set on the schema version.
//! The tracker records open write transactions per table so the coordinator
//! can wait for writes that started before shadows existed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::identifiers::SchemaVersion;
use crate::core::identifiers::TableId;
use crate::core::identifiers::TxnId;
use crate::core::schema::TableSchema;
use crate::interfaces::CatalogError;
use crate::interfaces::TableCatalog;
use crate::interfaces::TableDescriptor;
use crate::interfaces::TransactionTracker;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// In-memory table catalog; clones share state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableCatalog {
    /// Descriptors by table.
    tables: Arc<Mutex<BTreeMap<TableId, TableDescriptor>>>,
}

impl InMemoryTableCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a table descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the catalog lock is poisoned.
    pub fn register(&self, descriptor: TableDescriptor) -> Result<(), CatalogError> {
        self.tables
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog mutex poisoned".to_string()))?
            .insert(descriptor.schema.table_id, descriptor);
        Ok(())
    }

    /// Returns the identifiers of every registered table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the catalog lock is poisoned.
    pub fn table_ids(&self) -> Result<Vec<TableId>, CatalogError> {
        Ok(self
            .tables
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog mutex poisoned".to_string()))?
            .keys()
            .copied()
            .collect())
    }
}

impl TableCatalog for InMemoryTableCatalog {
    fn describe(&self, table_id: TableId) -> Result<TableDescriptor, CatalogError> {
        self.tables
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog mutex poisoned".to_string()))?
            .get(&table_id)
            .cloned()
            .ok_or(CatalogError::UnknownTable(table_id))
    }

    fn publish(
        &self,
        table_id: TableId,
        expected: SchemaVersion,
        schema: TableSchema,
    ) -> Result<(), CatalogError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog mutex poisoned".to_string()))?;
        let descriptor = tables.get_mut(&table_id).ok_or(CatalogError::UnknownTable(table_id))?;
        let actual = descriptor.schema.version;
        if actual != expected {
            return Err(CatalogError::VersionConflict {
                table_id,
                expected,
                actual,
            });
        }
        descriptor.schema = schema;
        Ok(())
    }
}

// ============================================================================
// SECTION: Transaction Tracker
// ============================================================================

/// Tracker state.
#[derive(Debug, Default)]
struct TxnState {
    /// Last issued transaction id.
    last: u64,
    /// Open transactions and their tables.
    open: BTreeMap<TxnId, TableId>,
}

/// In-memory write transaction tracker; clones share state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransactionTracker {
    /// Tracker state protected by a mutex.
    state: Arc<Mutex<TxnState>>,
}

impl InMemoryTransactionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a write transaction on a table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the tracker lock is poisoned.
    pub fn begin(&self, table_id: TableId) -> Result<TxnId, CatalogError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CatalogError::Unavailable("transaction tracker mutex poisoned".to_string()))?;
        state.last += 1;
        let txn_id = TxnId::from_raw(state.last)
            .ok_or_else(|| CatalogError::Unavailable("transaction id overflow".to_string()))?;
        state.open.insert(txn_id, table_id);
        Ok(txn_id)
    }

    /// Marks a transaction committed or aborted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the tracker lock is poisoned.
    pub fn resolve(&self, txn_id: TxnId) -> Result<(), CatalogError> {
        self.state
            .lock()
            .map_err(|_| CatalogError::Unavailable("transaction tracker mutex poisoned".to_string()))?
            .open
            .remove(&txn_id);
        Ok(())
    }
}

impl TransactionTracker for InMemoryTransactionTracker {
    fn active_transactions(&self, table_id: TableId) -> Result<Vec<TxnId>, CatalogError> {
        Ok(self
            .state
            .lock()
            .map_err(|_| CatalogError::Unavailable("transaction tracker mutex poisoned".to_string()))?
            .open
            .iter()
            .filter(|(_, table)| **table == table_id)
            .map(|(txn_id, _)| *txn_id)
            .collect())
    }

    fn is_resolved(&self, txn_id: TxnId) -> Result<bool, CatalogError> {
        Ok(!self
            .state
            .lock()
            .map_err(|_| CatalogError::Unavailable("transaction tracker mutex poisoned".to_string()))?
            .open
            .contains_key(&txn_id))
    }
}

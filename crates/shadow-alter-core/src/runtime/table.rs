// crates/shadow-alter-core/src/runtime/table.rs
// ============================================================================
// Module: Local Table Access
// Description: Table creation, loads, and reads over the in-memory collaborators.
// Purpose: Keep tables readable and writable while schema changes run.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`LocalTables`] is the write and read path of a single-process deployment.
//! Every load runs inside a tracked write transaction and holds the shared
//! side of the table lock, parses literal rows against the schema published
//! at that moment, and routes each row to a shard by its key. Reads merge
//! the rows of every shard in version order under the same lock, so merge
//! results do not depend on routing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::codec::encode_row;
use crate::core::identifiers::ShardId;
use crate::core::identifiers::StorageVersion;
use crate::core::identifiers::TableId;
use crate::core::identifiers::TxnId;
use crate::core::schema::SchemaError;
use crate::core::schema::TableSchema;
use crate::core::value::Row;
use crate::core::value::Value;
use crate::core::value::ValueError;
use crate::core::value::parse_literal;
use crate::interfaces::CatalogError;
use crate::interfaces::ShardPlacement;
use crate::interfaces::ShardStorage;
use crate::interfaces::StorageError;
use crate::interfaces::TableCatalog;
use crate::interfaces::TableDescriptor;
use crate::runtime::aggregate::merge_rows;
use crate::runtime::catalog::InMemoryTableCatalog;
use crate::runtime::catalog::InMemoryTransactionTracker;
use crate::runtime::locks::LockError;
use crate::runtime::locks::TableLocks;
use crate::runtime::storage::InMemoryShardStorage;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Table access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Catalog or transaction tracker failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Lock failure.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Literal row does not parse.
    #[error("row {row}, column[{column}]: {source}")]
    Value {
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
        /// Underlying error.
        source: ValueError,
    },
    /// NULL in a NOT NULL column.
    #[error("row {row}: NULL value in NOT NULL column[{column}]")]
    NullViolation {
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
    },
    /// Row width does not match the schema.
    #[error("row {row} has {actual} values but the table has {expected} columns")]
    Arity {
        /// Zero-based row index.
        row: usize,
        /// Column count.
        expected: usize,
        /// Value count.
        actual: usize,
    },
    /// Table must have at least one shard.
    #[error("table must have at least one shard")]
    NoShards,
}

// ============================================================================
// SECTION: Local Tables
// ============================================================================

/// Literal row: one optional SQL literal per column; `None` is NULL.
pub type LiteralRow = Vec<Option<String>>;

/// Read and write path over in-memory collaborators; clones share state.
#[derive(Debug, Default, Clone)]
pub struct LocalTables {
    /// Table catalog.
    catalog: InMemoryTableCatalog,
    /// Shard storage.
    storage: InMemoryShardStorage,
    /// Write transaction tracker.
    txns: InMemoryTransactionTracker,
    /// Table metadata locks.
    locks: TableLocks,
}

impl LocalTables {
    /// Creates an empty deployment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &InMemoryTableCatalog {
        &self.catalog
    }

    /// Returns the storage.
    #[must_use]
    pub const fn storage(&self) -> &InMemoryShardStorage {
        &self.storage
    }

    /// Returns the transaction tracker.
    #[must_use]
    pub const fn txns(&self) -> &InMemoryTransactionTracker {
        &self.txns
    }

    /// Returns the table locks.
    #[must_use]
    pub const fn locks(&self) -> &TableLocks {
        &self.locks
    }

    /// Creates a table with `shard_count` empty shards.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the schema is invalid or storage fails.
    pub fn create_table(
        &self,
        schema: TableSchema,
        shard_count: u64,
    ) -> Result<TableDescriptor, TableError> {
        schema.validate()?;
        if shard_count == 0 {
            return Err(TableError::NoShards);
        }
        let mut shards = Vec::new();
        for raw in 1 ..= shard_count {
            let shard_id = ShardId::from_raw(raw).ok_or(TableError::NoShards)?;
            shards.push(ShardPlacement {
                shard_id,
                handle: self.storage.create(&schema)?,
            });
        }
        let descriptor = TableDescriptor {
            schema,
            shards,
        };
        self.catalog.register(descriptor.clone())?;
        Ok(descriptor)
    }

    /// Opens a write transaction without loading rows.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Catalog`] when the tracker fails.
    pub fn begin_write(&self, table_id: TableId) -> Result<TxnId, TableError> {
        Ok(self.txns.begin(table_id)?)
    }

    /// Resolves a write transaction opened with [`LocalTables::begin_write`].
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Catalog`] when the tracker fails.
    pub fn end_write(&self, txn_id: TxnId) -> Result<(), TableError> {
        Ok(self.txns.resolve(txn_id)?)
    }

    /// Loads literal rows in one transaction and returns the row count.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when a row does not match the current schema or
    /// storage fails. No row is loaded when any row is invalid.
    pub fn insert(&self, table_id: TableId, rows: &[LiteralRow]) -> Result<usize, TableError> {
        let txn_id = self.txns.begin(table_id)?;
        let result = self.locks.with_shared(table_id, || self.insert_locked(table_id, rows));
        self.txns.resolve(txn_id)?;
        result?
    }

    /// Loads rows while the shared lock is held.
    fn insert_locked(&self, table_id: TableId, rows: &[LiteralRow]) -> Result<usize, TableError> {
        let descriptor = self.catalog.describe(table_id)?;
        let schema = &descriptor.schema;
        let mut per_shard: BTreeMap<usize, Vec<Row>> = BTreeMap::new();
        for (index, literals) in rows.iter().enumerate() {
            let row = parse_row(schema, index, literals)?;
            let shard = route(&row, schema.key_count(), descriptor.shards.len());
            per_shard.entry(shard).or_default().push(row);
        }
        for (shard, rows) in per_shard {
            if let Some(placement) = descriptor.shards.get(shard) {
                self.storage.load(&placement.handle, rows)?;
            }
        }
        Ok(rows.len())
    }

    /// Returns the current schema and merged rows of a table, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the table is unknown or storage fails.
    pub fn read(&self, table_id: TableId) -> Result<(TableSchema, Vec<Row>), TableError> {
        self.locks.with_shared(table_id, || {
            let descriptor = self.catalog.describe(table_id)?;
            let mut versioned = Vec::new();
            for placement in &descriptor.shards {
                let visible = self.storage.visible_version(&placement.handle)?;
                versioned.extend(self.storage.scan(&placement.handle, StorageVersion::ZERO, visible)?);
            }
            let rows = merge_rows(&descriptor.schema, versioned)
                .map_err(|err| StorageError::Invalid(err.to_string()))?;
            Ok((descriptor.schema, rows))
        })?
    }

    /// Returns the rows of a table rendered as text; NULL renders as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the read fails.
    pub fn read_text(&self, table_id: TableId) -> Result<Vec<LiteralRow>, TableError> {
        let (schema, rows) = self.read(table_id)?;
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&schema.columns)
                    .map(|(value, column)| value.render(&column.column_type))
                    .collect()
            })
            .collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses one literal row against a schema.
fn parse_row(schema: &TableSchema, index: usize, literals: &LiteralRow) -> Result<Row, TableError> {
    if literals.len() != schema.columns.len() {
        return Err(TableError::Arity {
            row: index,
            expected: schema.columns.len(),
            actual: literals.len(),
        });
    }
    let mut row = Vec::with_capacity(literals.len());
    for (literal, column) in literals.iter().zip(&schema.columns) {
        let value = match literal {
            Some(text) => {
                parse_literal(text, &column.column_type).map_err(|source| TableError::Value {
                    row: index,
                    column: column.name.clone(),
                    source,
                })?
            }
            None => Value::Null,
        };
        if value.is_null() && !column.nullable {
            return Err(TableError::NullViolation {
                row: index,
                column: column.name.clone(),
            });
        }
        row.push(value);
    }
    Ok(row)
}

/// Routes a row to a shard by an FNV-1a hash of its encoded key.
fn route(row: &[Value], keys: usize, shards: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in encode_row(&row[.. keys.min(row.len())]) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let shards = u64::try_from(shards.max(1)).unwrap_or(u64::MAX);
    usize::try_from(hash % shards).unwrap_or(0)
}

// crates/shadow-alter-core/src/runtime/mod.rs
// ============================================================================
// Module: Shadow Alter Runtime
// Description: Matrix, executor, shadow builder, dispatcher, and coordinator.
// Purpose: Execute online schema changes against the collaborator interfaces.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Components from leaf to root: the type compatibility [`matrix`], the row
//! conversion executor in [`convert`], the [`shadow`] replica builder, the
//! task [`dispatch`] layer, and the job state machine in [`coordinator`].
//! In-memory collaborators back tests and single-process runs.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregate;
pub mod catalog;
pub mod convert;
pub mod coordinator;
pub mod dispatch;
pub mod locks;
pub mod matrix;
pub mod shadow;
pub mod storage;
pub mod store;
pub mod table;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::aggregate::merge_rows;
pub use self::catalog::InMemoryTableCatalog;
pub use self::catalog::InMemoryTransactionTracker;
pub use self::convert::ConversionError;
pub use self::convert::ConversionPlan;
pub use self::coordinator::AlterError;
pub use self::coordinator::Coordinator;
pub use self::coordinator::CoordinatorConfig;
pub use self::dispatch::InlineTaskRunner;
pub use self::dispatch::WorkerConfig;
pub use self::dispatch::WorkerPoolRunner;
pub use self::dispatch::run_conversion_task;
pub use self::locks::LockError;
pub use self::locks::TableLocks;
pub use self::matrix::ConversionKind;
pub use self::matrix::DenyKind;
pub use self::matrix::Guard;
pub use self::matrix::IncompatibleTypeError;
pub use self::matrix::RewriteKind;
pub use self::matrix::RewritePlan;
pub use self::matrix::Verdict;
pub use self::shadow::BuilderError;
pub use self::shadow::ColumnReservations;
pub use self::storage::InMemoryShardStorage;
pub use self::store::InMemoryJobStore;
pub use self::store::SharedJobStore;
pub use self::table::LiteralRow;
pub use self::table::LocalTables;
pub use self::table::TableError;

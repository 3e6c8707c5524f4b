// crates/shadow-alter-store-sqlite/src/lib.rs
// ============================================================================
// Module: Shadow Alter SQLite Store
// Description: SQLite-backed job store for schema change jobs.
// Purpose: Keep job records durable across coordinator restarts.
// Dependencies: shadow-alter-core, rusqlite
// ============================================================================

//! ## Overview
//! Durable [`shadow_alter_core::JobStore`] implementation. See [`store`].

pub mod store;

pub use store::JobVersionSummary;
pub use store::MAX_JOB_BYTES;
pub use store::SqliteJobStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;

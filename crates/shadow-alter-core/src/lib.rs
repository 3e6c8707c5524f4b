// crates/shadow-alter-core/src/lib.rs
// ============================================================================
// Module: Shadow Alter Core Library
// Description: Online schema change engine for sharded analytical tables.
// Purpose: Alter column types, keys, and column sets while tables stay live.
// Dependencies: bigdecimal, serde, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Shadow Alter converts every shard of a table into a shadow laid out for
//! the target schema, replays writes that arrive during the build, and swaps
//! all shards together before publishing the new schema version.
//! Invariants:
//! - Requests are validated against the type compatibility matrix before any
//!   storage is allocated.
//! - Original storage is never written by a job.
//! - Readers see either the old layout on every shard or the new one.
//!
//! Collaborators are traits in [`interfaces`]; in-memory implementations live
//! in [`runtime`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::audit::FileAuditSink;
pub use crate::audit::JobAuditEvent;
pub use crate::audit::JobAuditSink;
pub use crate::audit::NoopAuditSink;
pub use crate::audit::RecordingAuditSink;
pub use crate::audit::StderrAuditSink;
pub use crate::core::*;
pub use crate::interfaces::CancelFlag;
pub use crate::interfaces::CatalogError;
pub use crate::interfaces::DispatchError;
pub use crate::interfaces::JobStore;
pub use crate::interfaces::ShardPlacement;
pub use crate::interfaces::ShardStorage;
pub use crate::interfaces::StorageError;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::TableCatalog;
pub use crate::interfaces::TableDescriptor;
pub use crate::interfaces::TaskAssignment;
pub use crate::interfaces::TaskReport;
pub use crate::interfaces::TaskReportKind;
pub use crate::interfaces::TaskRunner;
pub use crate::interfaces::TransactionTracker;
pub use crate::runtime::*;

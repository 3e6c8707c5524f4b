// crates/shadow-alter-core/src/core/mod.rs
// ============================================================================
// Module: Shadow Alter Core Types
// Description: Data model shared by the matrix, executor, and coordinator.
// Purpose: Provide stable, serializable types for schemas, values, and jobs.
// Dependencies: bigdecimal, serde, sha2, time
// ============================================================================

//! ## Overview
//! Pure data types with no I/O. Runtime components and storage backends build
//! on these definitions; job records are the canonical persisted form.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod codec;
pub mod hashing;
pub mod identifiers;
pub mod job;
pub mod schema;
pub mod time;
pub mod types;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::codec::digest_rows;
pub use self::codec::encode_row;
pub use self::hashing::DEFAULT_HASH_ALGORITHM;
pub use self::hashing::HashAlgorithm;
pub use self::hashing::HashDigest;
pub use self::identifiers::JobId;
pub use self::identifiers::SchemaVersion;
pub use self::identifiers::ShardId;
pub use self::identifiers::StorageHandle;
pub use self::identifiers::StorageVersion;
pub use self::identifiers::TableId;
pub use self::identifiers::TxnId;
pub use self::job::AlterJobStatus;
pub use self::job::JobState;
pub use self::job::SchemaChangeJob;
pub use self::job::ShadowReplica;
pub use self::job::ShardConversionTask;
pub use self::job::TaskStatus;
pub use self::schema::AggregationType;
pub use self::schema::AlterOp;
pub use self::schema::AlterTableRequest;
pub use self::schema::ColumnDef;
pub use self::schema::ColumnRole;
pub use self::schema::KeysModel;
pub use self::schema::SchemaError;
pub use self::schema::TableSchema;
pub use self::time::Timestamp;
pub use self::types::ColumnType;
pub use self::types::TypeCategory;
pub use self::types::TypeError;
pub use self::value::Row;
pub use self::value::Value;
pub use self::value::ValueError;
pub use self::value::VersionedRow;
pub use self::value::parse_literal;

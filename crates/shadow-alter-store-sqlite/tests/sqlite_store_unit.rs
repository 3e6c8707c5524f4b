// crates/shadow-alter-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Job Store Unit Tests
// Description: Integrity, retention, and recovery tests for the SQLite store.
// Purpose: Validate path safety, schema versioning, corruption detection,
//          retention, and coordinator restarts over a durable store.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` job store invariants:
//! - Path safety checks (empty/component/directory rejection)
//! - Schema version validation
//! - Hash algorithm validation and payload integrity
//! - Snapshot retention and job id high-water mark
//! - Journal modes and multi-threaded writes
//! - A coordinator resuming a job from a reopened store

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::params;
use shadow_alter_core::AlterOp;
use shadow_alter_core::AlterTableRequest;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnType;
use shadow_alter_core::Coordinator;
use shadow_alter_core::CoordinatorConfig;
use shadow_alter_core::InlineTaskRunner;
use shadow_alter_core::JobId;
use shadow_alter_core::JobState;
use shadow_alter_core::JobStore;
use shadow_alter_core::KeysModel;
use shadow_alter_core::LocalTables;
use shadow_alter_core::SchemaChangeJob;
use shadow_alter_core::SchemaVersion;
use shadow_alter_core::StoreError;
use shadow_alter_core::TableId;
use shadow_alter_core::TableSchema;
use shadow_alter_core::Timestamp;
use shadow_alter_core::WorkerConfig;
use shadow_alter_store_sqlite::SqliteJobStore;
use shadow_alter_store_sqlite::SqliteStoreConfig;
use shadow_alter_store_sqlite::SqliteStoreError;
use shadow_alter_store_sqlite::SqliteStoreMode;
use shadow_alter_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn table(table_id: u64) -> TableSchema {
    TableSchema {
        table_id: TableId::from_raw(table_id).expect("table id"),
        table_name: format!("t{table_id}"),
        version: SchemaVersion::INITIAL,
        keys_model: KeysModel::Duplicate,
        columns: vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Int),
        ],
    }
}

fn sample_job(job_id: u64, table_id: u64, state: JobState) -> SchemaChangeJob {
    let origin = table(table_id);
    let mut target = origin.clone();
    target.version = origin.version.next();
    target.columns[1] = ColumnDef::value("v", ColumnType::BigInt);
    SchemaChangeJob {
        job_id: JobId::from_raw(job_id).expect("job id"),
        table_id: origin.table_id,
        table_name: origin.table_name.clone(),
        origin_version: origin.version,
        origin_schema: origin,
        target_schema: target,
        touched_columns: vec!["v".to_string()],
        state,
        watermark_txns: Vec::new(),
        replicas: Vec::new(),
        tasks: Vec::new(),
        created_at: Timestamp::from_unix_millis(1_000),
        finished_at: state.is_terminal().then_some(Timestamp::from_unix_millis(2_000)),
        timeout_ms: 60_000,
        swap_pending: false,
        error: (state == JobState::Cancelled).then(|| "cancelled by user".to_string()),
    }
}

fn config_for_path(path: PathBuf, max_versions: Option<u64>) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path,
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        max_versions,
    }
}

fn store_for(path: &Path, max_versions: Option<u64>) -> SqliteJobStore {
    SqliteJobStore::new(config_for_path(path.to_path_buf(), max_versions)).expect("store init")
}

fn job_id(raw: u64) -> JobId {
    JobId::from_raw(raw).expect("job id")
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqliteJobStore::new(config_for_path(temp.path().to_path_buf(), None)) else {
        panic!("expected directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_empty_path() {
    let Err(err) = SqliteJobStore::new(config_for_path(PathBuf::new(), None)) else {
        panic!("expected empty path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_overlong_component() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a".repeat(300));
    let Err(err) = SqliteJobStore::new(config_for_path(path, None)) else {
        panic!("expected overlong component to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_zero_max_versions() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let Err(err) = SqliteJobStore::new(config_for_path(path, Some(0))) else {
        panic!("expected zero max_versions to fail");
    };
    assert_eq!(err, SqliteStoreError::Invalid("max_versions must be greater than zero".to_string()));
}

#[test]
fn sqlite_store_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("jobs.sqlite");
    let _store = store_for(&path, None);
    assert!(path.exists());
}

// ============================================================================
// SECTION: Schema Versioning
// ============================================================================

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE store_meta (version INTEGER NOT NULL, max_job_id INTEGER NOT NULL);",
    )
    .unwrap();
    conn.execute("INSERT INTO store_meta (version, max_job_id) VALUES (?1, 0)", params![999_i64])
        .unwrap();
    drop(conn);

    let Err(err) = SqliteJobStore::new(config_for_path(path, None)) else {
        panic!("expected schema mismatch to fail");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn sqlite_store_reopens_existing_database() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let job = sample_job(3, 1, JobState::Running);
    store_for(&path, None).persist(&job).unwrap();

    let reopened = store_for(&path, None);
    assert_eq!(reopened.load(job.job_id).unwrap(), Some(job));
}

// ============================================================================
// SECTION: Persist and Load
// ============================================================================

#[test]
fn sqlite_store_load_missing_job_returns_none() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("jobs.sqlite"), None);
    assert_eq!(store.load(job_id(42)).unwrap(), None);
    assert_eq!(store.max_job_id().unwrap(), None);
    assert!(store.list(None).unwrap().is_empty());
}

#[test]
fn sqlite_store_returns_latest_snapshot() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("jobs.sqlite"), None);
    let mut job = sample_job(1, 1, JobState::Pending);
    store.persist(&job).unwrap();
    job.state = JobState::WaitingTxn;
    store.persist(&job).unwrap();
    job.state = JobState::Running;
    store.persist(&job).unwrap();

    assert_eq!(store.load(job.job_id).unwrap(), Some(job.clone()));
    let versions = store.list_job_versions(job.job_id).unwrap();
    let states: Vec<JobState> = versions.iter().map(|version| version.state).collect();
    assert_eq!(states, vec![JobState::Running, JobState::WaitingTxn, JobState::Pending]);
    assert_eq!(versions[0].version, 3);
}

#[test]
fn sqlite_store_list_filters_and_orders_by_job_id() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("jobs.sqlite"), None);
    store.persist(&sample_job(5, 2, JobState::Running)).unwrap();
    store.persist(&sample_job(2, 1, JobState::Finished)).unwrap();
    store.persist(&sample_job(4, 1, JobState::Cancelled)).unwrap();
    store.persist(&sample_job(3, 1, JobState::Pending)).unwrap();

    let all: Vec<u64> = store.list(None).unwrap().iter().map(|job| job.job_id.get()).collect();
    assert_eq!(all, vec![2, 3, 4, 5]);

    let table_one = TableId::from_raw(1).expect("table id");
    let filtered: Vec<u64> =
        store.list(Some(table_one)).unwrap().iter().map(|job| job.job_id.get()).collect();
    assert_eq!(filtered, vec![2, 3, 4]);

    let pending: Vec<u64> =
        store.load_pending().unwrap().iter().map(|job| job.job_id.get()).collect();
    assert_eq!(pending, vec![3, 5]);
}

#[test]
fn sqlite_store_keeps_max_job_id_after_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(7, 1, JobState::Finished)).unwrap();
    store.persist(&sample_job(3, 1, JobState::Finished)).unwrap();
    store.archive(job_id(7)).unwrap();
    store.archive(job_id(3)).unwrap();

    assert!(store.list(None).unwrap().is_empty());
    assert!(store.list_job_versions(job_id(7)).unwrap().is_empty());
    assert_eq!(store.max_job_id().unwrap(), Some(job_id(7)));
    drop(store);
    assert_eq!(store_for(&path, None).max_job_id().unwrap(), Some(job_id(7)));
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

#[test]
fn sqlite_store_detects_hash_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(1, 1, JobState::Running)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE job_versions SET job_hash = 'bad' WHERE job_id = 1", params![]).unwrap();

    let err = store.load(job_id(1)).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)), "{err}");
    assert!(err.to_string().contains("hash mismatch"));
    assert!(store.load_pending().is_err());
}

#[test]
fn sqlite_store_detects_tampered_payload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(1, 1, JobState::Running)).unwrap();

    let conn = Connection::open(&path).unwrap();
    let bytes: Vec<u8> = conn
        .query_row("SELECT job_json FROM job_versions WHERE job_id = 1", params![], |row| {
            row.get(0)
        })
        .unwrap();
    let tampered = String::from_utf8(bytes).unwrap().replace("RUNNING", "FINISHED");
    conn.execute(
        "UPDATE job_versions SET job_json = ?1 WHERE job_id = 1",
        params![tampered.into_bytes()],
    )
    .unwrap();

    assert!(matches!(store.load(job_id(1)), Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_detects_invalid_latest_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(1, 1, JobState::Running)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE jobs SET latest_version = 0 WHERE job_id = 1", params![]).unwrap();

    let err = store.load(job_id(1)).unwrap_err();
    assert!(err.to_string().contains("invalid latest_version"), "{err}");
}

#[test]
fn sqlite_store_rejects_unknown_hash_algorithm() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(1, 1, JobState::Running)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE job_versions SET hash_algorithm = 'md5' WHERE job_id = 1", params![])
        .unwrap();

    let err = store.load(job_id(1)).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
    assert!(err.to_string().contains("unsupported hash algorithm"));
}

#[test]
fn sqlite_store_rejects_job_id_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let store = store_for(&path, None);
    store.persist(&sample_job(1, 1, JobState::Running)).unwrap();
    store.persist(&sample_job(2, 1, JobState::Running)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "UPDATE job_versions SET job_json = (SELECT job_json FROM job_versions WHERE job_id = 2), \
         job_hash = (SELECT job_hash FROM job_versions WHERE job_id = 2) WHERE job_id = 1;",
    )
    .unwrap();

    let err = store.load(job_id(1)).unwrap_err();
    assert!(err.to_string().contains("job id mismatch"), "{err}");
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[test]
fn sqlite_store_enforces_max_versions() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("jobs.sqlite"), Some(2));
    let mut job = sample_job(1, 1, JobState::Pending);
    for state in [JobState::Pending, JobState::WaitingTxn, JobState::Running, JobState::Finished] {
        job.state = state;
        store.persist(&job).unwrap();
    }

    let versions: Vec<u64> = store
        .list_job_versions(job.job_id)
        .unwrap()
        .iter()
        .map(|version| version.version)
        .collect();
    assert_eq!(versions, vec![4, 3]);
    assert_eq!(store.load(job.job_id).unwrap().map(|job| job.state), Some(JobState::Finished));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn retention_keeps_newest_versions(writes in 1_u64 .. 12, max_versions in 1_u64 .. 5) {
        let temp = TempDir::new().unwrap();
        let store = store_for(&temp.path().join("jobs.sqlite"), Some(max_versions));
        let mut job = sample_job(1, 1, JobState::Pending);
        for write in 0 .. writes {
            job.timeout_ms = 60_000 + write;
            store.persist(&job).unwrap();
        }

        let versions: Vec<u64> = store
            .list_job_versions(job.job_id)
            .unwrap()
            .iter()
            .map(|version| version.version)
            .collect();
        let kept = writes.min(max_versions);
        let expected: Vec<u64> = (writes - kept + 1 ..= writes).rev().collect();
        prop_assert_eq!(versions, expected);
        let latest = store.load(job.job_id).unwrap().unwrap();
        prop_assert_eq!(latest.timeout_ms, 60_000 + writes - 1);
    }
}

// ============================================================================
// SECTION: Journal Mode and Concurrency
// ============================================================================

#[test]
fn sqlite_store_sets_wal_mode() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let _store = store_for(&path, None);

    let conn = Connection::open(&path).unwrap();
    let mode: String = conn.query_row("PRAGMA journal_mode", params![], |row| row.get(0)).unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn sqlite_store_sets_delete_mode() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let config = SqliteStoreConfig {
        journal_mode: SqliteStoreMode::Delete,
        sync_mode: SqliteSyncMode::Normal,
        ..SqliteStoreConfig::for_path(path.clone())
    };
    let _store = SqliteJobStore::new(config).unwrap();

    let conn = Connection::open(&path).unwrap();
    let mode: String = conn.query_row("PRAGMA journal_mode", params![], |row| row.get(0)).unwrap();
    assert_eq!(mode.to_lowercase(), "delete");
}

#[test]
fn sqlite_store_supports_concurrent_writes() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("jobs.sqlite"), None));

    let mut handles = Vec::new();
    for i in 1 ..= 4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.persist(&sample_job(i, 1, JobState::Pending)).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list(None).unwrap().len(), 4);
    assert_eq!(store.max_job_id().unwrap(), Some(job_id(4)));
}

#[test]
fn sqlite_store_error_maps_to_store_error() {
    let mapped: StoreError = SqliteStoreError::TooLarge {
        max_bytes: 10,
        actual_bytes: 11,
    }
    .into();
    assert!(matches!(mapped, StoreError::Invalid(_)));
    let mapped: StoreError = SqliteStoreError::Db("locked".to_string()).into();
    assert_eq!(mapped, StoreError::Io("locked".to_string()));
}

// ============================================================================
// SECTION: Coordinator Restart
// ============================================================================

#[test]
fn coordinator_resumes_job_from_reopened_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.sqlite");
    let tables = LocalTables::new();
    let table_id = TableId::from_raw(1).expect("table id");
    tables.create_table(table(1), 2).unwrap();
    let rows: Vec<Vec<Option<String>>> = (0 .. 6)
        .map(|index| vec![Some(index.to_string()), Some((index * 10).to_string())])
        .collect();
    tables.insert(table_id, &rows).unwrap();
    let request = AlterTableRequest {
        table_id,
        ops: vec![AlterOp::ModifyColumn(ColumnDef::value("v", ColumnType::BigInt))],
    };

    let runner = InlineTaskRunner::new(tables.storage().clone(), WorkerConfig::default());
    let mut first = Coordinator::new(
        tables.catalog().clone(),
        tables.storage().clone(),
        tables.txns().clone(),
        store_for(&path, None),
        runner,
        CoordinatorConfig::default(),
    )
    .unwrap()
    .with_locks(tables.locks().clone());
    let submitted = first.submit_alter(&request, Timestamp::from_unix_millis(0)).unwrap();
    first.tick(Timestamp::from_unix_millis(0)).unwrap();
    drop(first);

    let runner = InlineTaskRunner::new(tables.storage().clone(), WorkerConfig::default());
    let mut second = Coordinator::new(
        tables.catalog().clone(),
        tables.storage().clone(),
        tables.txns().clone(),
        store_for(&path, None),
        runner,
        CoordinatorConfig::default(),
    )
    .unwrap()
    .with_locks(tables.locks().clone());
    assert_eq!(second.recover(Timestamp::from_unix_millis(10)).unwrap(), 1);
    for step in 11 .. 21 {
        second.tick(Timestamp::from_unix_millis(step)).unwrap();
    }

    let job = second.job(submitted).expect("job");
    assert_eq!(job.state, JobState::Finished, "error: {:?}", job.error);
    let mut read = tables.read_text(table_id).unwrap();
    read.sort();
    let mut expected = rows;
    expected.sort();
    assert_eq!(read, expected);

    let stored = store_for(&path, None);
    assert_eq!(stored.load(submitted).unwrap().map(|job| job.state), Some(JobState::Finished));
    assert!(stored.load_pending().unwrap().is_empty());
}

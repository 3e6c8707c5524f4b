// crates/shadow-alter-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Job Store
// Description: Durable JobStore backed by SQLite.
// Purpose: Persist schema change job snapshots with integrity hashes.
// Dependencies: shadow-alter-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`JobStore`] using `SQLite`. Each persist
//! appends a canonical JSON snapshot of the job to `job_versions` and moves
//! the job's `latest_version` pointer. Loads recompute the snapshot hash and
//! fail closed on mismatch.
//!
//! The highest job id ever persisted is kept in `store_meta`, so archiving
//! every job never lets a restarted coordinator reuse an id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use shadow_alter_core::HashAlgorithm;
use shadow_alter_core::JobId;
use shadow_alter_core::JobState;
use shadow_alter_core::JobStore;
use shadow_alter_core::SchemaChangeJob;
use shadow_alter_core::StoreError;
use shadow_alter_core::TableId;
use shadow_alter_core::Timestamp;
use shadow_alter_core::hashing::canonical_json_bytes;
use shadow_alter_core::hashing::hash_bytes;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum job snapshot size accepted by the store.
pub const MAX_JOB_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` job store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `max_versions`, when set, must be greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional maximum snapshots kept per job (older snapshots pruned).
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default settings.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw job payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Job snapshot exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "job snapshot exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed job store.
///
/// # Invariants
/// - Every stored snapshot carries the digest of its canonical JSON bytes.
/// - `store_meta.max_job_id` never decreases.
#[derive(Debug)]
pub struct SqliteJobStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Connection guarded for serialized access.
    connection: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Opens (or creates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        if config.max_versions == Some(0) {
            return Err(SqliteStoreError::Invalid(
                "max_versions must be greater than zero".to_string(),
            ));
        }
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Lists stored snapshot versions of a job, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn list_job_versions(&self, job_id: JobId) -> Result<Vec<JobVersionSummary>, SqliteStoreError> {
        self.with_transaction(|tx| {
            let mut statement = tx.prepare(
                "SELECT version, job_hash, hash_algorithm, state, saved_at FROM job_versions \
                 WHERE job_id = ?1 ORDER BY version DESC",
            )?;
            let rows = statement.query_map(params![job_key(job_id)?], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;
            let mut versions = Vec::new();
            for row in rows {
                let (version, hash, algorithm, state, saved_at) = row?;
                let version = u64::try_from(version).map_err(|_| {
                    SqliteStoreError::Corrupt(format!("negative version for job {job_id}"))
                })?;
                versions.push(JobVersionSummary {
                    version,
                    hash,
                    hash_algorithm: parse_hash_algorithm(&algorithm)?,
                    state: parse_state(&state)?,
                    saved_at: Timestamp::from_unix_millis(saved_at),
                });
            }
            Ok(versions)
        })
    }

    /// Runs `f` inside a transaction on the locked connection.
    fn with_transaction<R>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<R, SqliteStoreError>,
    ) -> Result<R, SqliteStoreError> {
        let mut guard =
            self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let result = {
            let tx = guard.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            result
        };
        drop(guard);
        Ok(result)
    }

    /// Appends a snapshot for `job`.
    fn persist_job(&self, job: &SchemaChangeJob) -> Result<(), SqliteStoreError> {
        let bytes = canonical_json_bytes(job)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if bytes.len() > MAX_JOB_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_JOB_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let digest = hash_bytes(HashAlgorithm::Sha256, &bytes);
        let job_id = job_key(job.job_id)?;
        let table_id = i64::try_from(job.table_id.get())
            .map_err(|_| SqliteStoreError::Invalid("table id too large".to_string()))?;
        let saved_at = Timestamp::now().as_unix_millis();
        let max_versions = self.config.max_versions;
        self.with_transaction(|tx| {
            let latest: Option<i64> = tx
                .query_row(
                    "SELECT latest_version FROM jobs WHERE job_id = ?1",
                    params![job_id],
                    |row| row.get(0),
                )
                .optional()?;
            let version = latest.unwrap_or(0) + 1;
            tx.execute(
                "INSERT INTO jobs (job_id, table_id, state, terminal, latest_version) VALUES (?1, \
                 ?2, ?3, ?4, ?5) ON CONFLICT(job_id) DO UPDATE SET table_id = excluded.table_id, \
                 state = excluded.state, terminal = excluded.terminal, latest_version = \
                 excluded.latest_version",
                params![job_id, table_id, job.state.as_str(), job.state.is_terminal(), version],
            )?;
            tx.execute(
                "INSERT INTO job_versions (job_id, version, state, job_json, job_hash, \
                 hash_algorithm, saved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    job_id,
                    version,
                    job.state.as_str(),
                    bytes,
                    digest.value,
                    digest.algorithm.label(),
                    saved_at
                ],
            )?;
            tx.execute(
                "UPDATE store_meta SET max_job_id = ?1 WHERE max_job_id < ?1",
                params![job_id],
            )?;
            enforce_retention(tx, job_id, version, max_versions)
        })
    }

    /// Loads the latest snapshot of one job.
    fn load_job(&self, job_id: JobId) -> Result<Option<SchemaChangeJob>, SqliteStoreError> {
        let key = job_key(job_id)?;
        self.with_transaction(|tx| {
            let latest: Option<i64> = tx
                .query_row(
                    "SELECT latest_version FROM jobs WHERE job_id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            match latest {
                None => Ok(None),
                Some(version) => load_snapshot(tx, job_id, version).map(Some),
            }
        })
    }

    /// Loads the latest snapshot of every job matching `filter`, by job id.
    fn load_where(
        &self,
        filter: &str,
        table_id: Option<i64>,
    ) -> Result<Vec<SchemaChangeJob>, SqliteStoreError> {
        let sql = format!("SELECT job_id, latest_version FROM jobs {filter} ORDER BY job_id");
        self.with_transaction(|tx| {
            let mut statement = tx.prepare(&sql)?;
            let mut heads = Vec::new();
            let mut rows = match table_id {
                Some(table_id) => statement.query(params![table_id])?,
                None => statement.query(params![])?,
            };
            while let Some(row) = rows.next()? {
                let raw: i64 = row.get(0)?;
                let version: i64 = row.get(1)?;
                heads.push((parse_job_id(raw)?, version));
            }
            drop(rows);
            heads.into_iter().map(|(job_id, version)| load_snapshot(tx, job_id, version)).collect()
        })
    }
}

impl JobStore for SqliteJobStore {
    fn persist(&self, job: &SchemaChangeJob) -> Result<(), StoreError> {
        self.persist_job(job).map_err(StoreError::from)
    }

    fn load(&self, job_id: JobId) -> Result<Option<SchemaChangeJob>, StoreError> {
        self.load_job(job_id).map_err(StoreError::from)
    }

    fn load_pending(&self) -> Result<Vec<SchemaChangeJob>, StoreError> {
        self.load_where("WHERE terminal = 0", None).map_err(StoreError::from)
    }

    fn list(&self, table_id: Option<TableId>) -> Result<Vec<SchemaChangeJob>, StoreError> {
        let result = match table_id {
            Some(table_id) => i64::try_from(table_id.get())
                .map_err(|_| SqliteStoreError::Invalid("table id too large".to_string()))
                .and_then(|raw| self.load_where("WHERE table_id = ?1", Some(raw))),
            None => self.load_where("", None),
        };
        result.map_err(StoreError::from)
    }

    fn archive(&self, job_id: JobId) -> Result<(), StoreError> {
        let key = job_key(job_id)?;
        self.with_transaction(|tx| {
            tx.execute("DELETE FROM job_versions WHERE job_id = ?1", params![key])?;
            tx.execute("DELETE FROM jobs WHERE job_id = ?1", params![key])?;
            Ok(())
        })
        .map_err(StoreError::from)
    }

    fn max_job_id(&self) -> Result<Option<JobId>, StoreError> {
        self.with_transaction(|tx| {
            let raw: i64 =
                tx.query_row("SELECT max_job_id FROM store_meta LIMIT 1", params![], |row| {
                    row.get(0)
                })?;
            if raw == 0 { Ok(None) } else { parse_job_id(raw).map(Some) }
        })
        .map_err(StoreError::from)
    }
}

/// Metadata for one stored job snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobVersionSummary {
    /// Snapshot version, starting at 1.
    pub version: u64,
    /// Hex digest of the canonical snapshot bytes.
    pub hash: String,
    /// Digest algorithm.
    pub hash_algorithm: HashAlgorithm,
    /// Job state recorded by the snapshot.
    pub state: JobState,
    /// Time the snapshot was written.
    pub saved_at: Timestamp,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL, max_job_id INTEGER NOT \
         NULL);",
    )?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute(
                "INSERT INTO store_meta (version, max_job_id) VALUES (?1, 0)",
                params![SCHEMA_VERSION],
            )?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS jobs (
                    job_id INTEGER PRIMARY KEY,
                    table_id INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    terminal INTEGER NOT NULL,
                    latest_version INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_jobs_table_id ON jobs (table_id);
                CREATE INDEX IF NOT EXISTS idx_jobs_terminal ON jobs (terminal);
                CREATE TABLE IF NOT EXISTS job_versions (
                    job_id INTEGER NOT NULL,
                    version INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    job_json BLOB NOT NULL,
                    job_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL,
                    PRIMARY KEY (job_id, version),
                    FOREIGN KEY (job_id) REFERENCES jobs(job_id) ON DELETE CASCADE
                );",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

/// Loads and verifies one snapshot.
fn load_snapshot(
    tx: &Transaction<'_>,
    job_id: JobId,
    version: i64,
) -> Result<SchemaChangeJob, SqliteStoreError> {
    if version < 1 {
        return Err(SqliteStoreError::Corrupt(format!("invalid latest_version for job {job_id}")));
    }
    let key = job_key(job_id)?;
    let metadata = tx
        .query_row(
            "SELECT length(job_json), job_hash, hash_algorithm FROM job_versions WHERE job_id = \
             ?1 AND version = ?2",
            params![key, version],
            |row| {
                let length: i64 = row.get(0)?;
                let hash: String = row.get(1)?;
                let algorithm: String = row.get(2)?;
                Ok((length, hash, algorithm))
            },
        )
        .optional()?;
    let (length, hash, algorithm) = metadata.ok_or_else(|| {
        SqliteStoreError::Corrupt(format!("missing snapshot version {version} for job {job_id}"))
    })?;
    let length = usize::try_from(length).map_err(|_| {
        SqliteStoreError::Invalid(format!("negative snapshot length for job {job_id}"))
    })?;
    if length > MAX_JOB_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_JOB_BYTES,
            actual_bytes: length,
        });
    }
    let algorithm = parse_hash_algorithm(&algorithm)?;
    let bytes: Vec<u8> = tx.query_row(
        "SELECT job_json FROM job_versions WHERE job_id = ?1 AND version = ?2",
        params![key, version],
        |row| row.get(0),
    )?;
    let digest = hash_bytes(algorithm, &bytes);
    if digest.value != hash {
        return Err(SqliteStoreError::Corrupt(format!("hash mismatch for job {job_id}")));
    }
    let job: SchemaChangeJob = serde_json::from_slice(&bytes)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if job.job_id != job_id {
        return Err(SqliteStoreError::Corrupt(format!(
            "job id mismatch: row {job_id} holds job {}",
            job.job_id
        )));
    }
    Ok(job)
}

/// Prunes snapshots older than the newest `max_versions`.
fn enforce_retention(
    tx: &Transaction<'_>,
    job_id: i64,
    latest_version: i64,
    max_versions: Option<u64>,
) -> Result<(), SqliteStoreError> {
    let Some(max_versions) = max_versions else {
        return Ok(());
    };
    let max_versions = i64::try_from(max_versions)
        .map_err(|_| SqliteStoreError::Invalid("max_versions too large".to_string()))?;
    if latest_version > max_versions {
        tx.execute(
            "DELETE FROM job_versions WHERE job_id = ?1 AND version < ?2",
            params![job_id, latest_version - max_versions + 1],
        )?;
    }
    Ok(())
}

/// Converts a job id to its column value.
fn job_key(job_id: JobId) -> Result<i64, SqliteStoreError> {
    i64::try_from(job_id.get()).map_err(|_| SqliteStoreError::Invalid("job id too large".to_string()))
}

/// Parses a stored job id.
fn parse_job_id(raw: i64) -> Result<JobId, SqliteStoreError> {
    u64::try_from(raw)
        .ok()
        .and_then(JobId::from_raw)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("invalid job id: {raw}")))
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::from_label(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}

/// Parses a stored job state label.
fn parse_state(label: &str) -> Result<JobState, SqliteStoreError> {
    [JobState::Pending, JobState::WaitingTxn, JobState::Running, JobState::Finished, JobState::Cancelled]
        .into_iter()
        .find(|state| state.as_str() == label)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("unknown job state: {label}")))
}

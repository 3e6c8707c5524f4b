// crates/shadow-alter-config/src/config.rs
// ============================================================================
// Module: Shadow Alter Configuration
// Description: Configuration loading and validation for shadow-alter hosts.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: shadow-alter-core, shadow-alter-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Out-of-range values fail the load instead of being clamped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use shadow_alter_core::CoordinatorConfig;
use shadow_alter_core::WorkerConfig;
use shadow_alter_core::runtime::coordinator::DEFAULT_JOB_RETENTION_MS;
use shadow_alter_core::runtime::coordinator::DEFAULT_JOB_TIMEOUT_MS;
use shadow_alter_core::runtime::coordinator::DEFAULT_MAX_TASK_RETRIES;
use shadow_alter_core::runtime::coordinator::DEFAULT_TASK_TIMEOUT_MS;
use shadow_alter_core::runtime::dispatch::DEFAULT_BATCH_PARALLELISM;
use shadow_alter_core::runtime::dispatch::DEFAULT_BATCH_ROWS;
use shadow_alter_core::runtime::dispatch::DEFAULT_POOL_SIZE;
use shadow_alter_core::runtime::dispatch::DEFAULT_QUEUE_CAPACITY;
use shadow_alter_store_sqlite::SqliteStoreConfig;
use shadow_alter_store_sqlite::SqliteStoreMode;
use shadow_alter_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "shadow-alter.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SHADOW_ALTER_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default coordinator tick interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Maximum coordinator tick interval.
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Maximum retries per shard task.
const MAX_TASK_RETRIES: u32 = 100;
/// Maximum worker threads.
const MAX_POOL_SIZE: usize = 256;
/// Maximum rows per conversion batch.
const MAX_BATCH_ROWS: usize = 1_000_000;
/// Maximum conversion threads per batch.
const MAX_BATCH_PARALLELISM: usize = 64;
/// Maximum queued assignments.
const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Default `SQLite` busy timeout.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Shadow Alter host configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShadowAlterConfig {
    /// Coordinator timing and retry settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Conversion worker settings.
    #[serde(default)]
    pub workers: WorkersConfig,
    /// Job store backend.
    #[serde(default)]
    pub job_store: JobStoreConfig,
    /// Audit event sink.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ShadowAlterConfig {
    /// Loads configuration from disk.
    ///
    /// The path is `path` when given, else `SHADOW_ALTER_CONFIG`, else
    /// `shadow-alter.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.workers.validate()?;
        self.job_store.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the coordinator settings.
    #[must_use]
    pub const fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            task_timeout_ms: self.scheduler.task_timeout_ms,
            max_task_retries: self.scheduler.max_task_retries,
            job_timeout_ms: self.scheduler.job_timeout_ms,
            job_retention_ms: self.scheduler.job_retention_ms,
        }
    }

    /// Returns the worker pool settings.
    #[must_use]
    pub const fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            pool_size: self.workers.pool_size,
            batch_rows: self.workers.batch_rows,
            batch_parallelism: self.workers.batch_parallelism,
            queue_capacity: self.workers.queue_capacity,
        }
    }

    /// Returns the coordinator tick interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.poll_interval_ms)
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Coordinator timing and retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Coordinator tick interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-attempt task timeout in milliseconds.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// Retries per shard task after the first attempt.
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,
    /// Job timeout in milliseconds, measured from submission.
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,
    /// Time terminal jobs stay visible before archival.
    #[serde(default = "default_job_retention_ms")]
    pub job_retention_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            max_task_retries: default_max_task_retries(),
            job_timeout_ms: default_job_timeout_ms(),
            job_retention_ms: default_job_retention_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Validates scheduler configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "scheduler.poll_interval_ms must be between 1 and {MAX_POLL_INTERVAL_MS}"
            )));
        }
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.task_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_task_retries > MAX_TASK_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "scheduler.max_task_retries must be at most {MAX_TASK_RETRIES}"
            )));
        }
        if self.job_timeout_ms < self.task_timeout_ms {
            return Err(ConfigError::Invalid(
                "scheduler.job_timeout_ms must be at least scheduler.task_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Workers
// ============================================================================

/// Conversion worker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkersConfig {
    /// Worker thread count.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Rows per converted batch.
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,
    /// Conversion threads per batch.
    #[serde(default = "default_batch_parallelism")]
    pub batch_parallelism: usize,
    /// Assignment queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            batch_rows: default_batch_rows(),
            batch_parallelism: default_batch_parallelism(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl WorkersConfig {
    /// Validates worker configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("workers.pool_size", self.pool_size, MAX_POOL_SIZE)?;
        check_range("workers.batch_rows", self.batch_rows, MAX_BATCH_ROWS)?;
        check_range("workers.batch_parallelism", self.batch_parallelism, MAX_BATCH_PARALLELISM)?;
        check_range("workers.queue_capacity", self.queue_capacity, MAX_QUEUE_CAPACITY)
    }
}

// ============================================================================
// SECTION: Job Store
// ============================================================================

/// Job store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Job store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: JobStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional snapshots retained per job.
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            store_type: JobStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

impl JobStoreConfig {
    /// Validates job store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            JobStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory job_store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            JobStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite job_store requires path".to_string())
                })?;
                validate_store_path(path)?;
                if self.max_versions == Some(0) {
                    return Err(ConfigError::Invalid(
                        "job_store max_versions must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store settings, or `None` for the memory backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match self.store_type {
            JobStoreType::Memory => None,
            JobStoreType::Sqlite => self.path.as_ref().map(|path| SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
                max_versions: self.max_versions,
            }),
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Audit event configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    /// Sink receiving job audit events.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Audit log path (JSON lines) for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default coordinator tick interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Returns the default task timeout.
const fn default_task_timeout_ms() -> u64 {
    DEFAULT_TASK_TIMEOUT_MS
}

/// Returns the default task retry bound.
const fn default_max_task_retries() -> u32 {
    DEFAULT_MAX_TASK_RETRIES
}

/// Returns the default job timeout.
const fn default_job_timeout_ms() -> u64 {
    DEFAULT_JOB_TIMEOUT_MS
}

/// Returns the default terminal job retention.
const fn default_job_retention_ms() -> u64 {
    DEFAULT_JOB_RETENTION_MS
}

/// Returns the default worker thread count.
const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Returns the default batch size.
const fn default_batch_rows() -> usize {
    DEFAULT_BATCH_ROWS
}

/// Returns the default batch parallelism.
const fn default_batch_parallelism() -> usize {
    DEFAULT_BATCH_PARALLELISM
}

/// Returns the default assignment queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the job store path.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("job_store path must be non-empty".to_string()));
    }
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("job_store path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("job_store path component too long".to_string()));
        }
    }
    Ok(())
}

/// Checks `1 <= value <= max`.
fn check_range(field: &str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {max}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let result = validate_path_string("audit.path", "   ");
        assert!(result.unwrap_err().to_string().contains("audit.path must be non-empty"));
    }

    #[test]
    fn validate_path_string_accepts_component_at_max() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH));
        assert!(validate_path_string("audit.path", &path).is_ok());
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        assert!(validate_path_string("audit.path", &path).is_err());
    }

    #[test]
    fn check_range_is_inclusive() {
        assert!(check_range("workers.pool_size", 1, 4).is_ok());
        assert!(check_range("workers.pool_size", 4, 4).is_ok());
        assert!(check_range("workers.pool_size", 0, 4).is_err());
        assert!(check_range("workers.pool_size", 5, 4).is_err());
    }

    #[test]
    fn resolve_path_prefers_explicit_path() {
        let resolved = resolve_path(Some(Path::new("explicit.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("explicit.toml"));
    }
}

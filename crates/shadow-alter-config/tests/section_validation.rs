//! Section validation tests for shadow-alter-config.
// crates/shadow-alter-config/tests/section_validation.rs
// =============================================================================
// Module: Section Validation Tests
// Description: Validate scheduler, worker, job store, and audit constraints.
// Purpose: Ensure out-of-range settings fail closed.
// =============================================================================

use std::path::PathBuf;

use shadow_alter_config::AuditSinkType;
use shadow_alter_config::JobStoreType;
use shadow_alter_config::ShadowAlterConfig;
use shadow_alter_core::CoordinatorConfig;
use shadow_alter_core::WorkerConfig;

mod common;

use common::TestResult;
use common::assert_invalid;

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_matches_core_defaults() -> TestResult {
    let config = ShadowAlterConfig::from_toml("").map_err(|err| err.to_string())?;
    if config.coordinator_config() != CoordinatorConfig::default() {
        return Err("coordinator defaults diverged".to_string());
    }
    if config.worker_config() != WorkerConfig::default() {
        return Err("worker defaults diverged".to_string());
    }
    if config.job_store.sqlite_config().is_some() {
        return Err("memory store must not produce sqlite config".to_string());
    }
    if config.audit.sink != AuditSinkType::Stderr {
        return Err("audit should default to stderr".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

#[test]
fn scheduler_rejects_zero_poll_interval() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.scheduler.poll_interval_ms = 0;
    assert_invalid(config.validate(), "scheduler.poll_interval_ms must be between 1 and 60000")
}

#[test]
fn scheduler_rejects_zero_task_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.scheduler.task_timeout_ms = 0;
    assert_invalid(config.validate(), "scheduler.task_timeout_ms must be greater than zero")
}

#[test]
fn scheduler_rejects_excessive_retries() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.scheduler.max_task_retries = 101;
    assert_invalid(config.validate(), "scheduler.max_task_retries must be at most 100")
}

#[test]
fn scheduler_rejects_job_timeout_below_task_timeout() -> TestResult {
    assert_invalid(
        ShadowAlterConfig::from_toml("[scheduler]\ntask_timeout_ms = 1000\njob_timeout_ms = 999\n"),
        "scheduler.job_timeout_ms must be at least scheduler.task_timeout_ms",
    )
}

// ============================================================================
// SECTION: Workers
// ============================================================================

#[test]
fn workers_reject_out_of_range_values() -> TestResult {
    let cases = [
        ("[workers]\npool_size = 0\n", "workers.pool_size must be between 1 and 256"),
        ("[workers]\nbatch_rows = 0\n", "workers.batch_rows must be between 1 and 1000000"),
        ("[workers]\nbatch_parallelism = 65\n", "workers.batch_parallelism must be between 1 and 64"),
        ("[workers]\nqueue_capacity = 0\n", "workers.queue_capacity must be between 1 and 65536"),
    ];
    for (toml, needle) in cases {
        assert_invalid(ShadowAlterConfig::from_toml(toml), needle)?;
    }
    Ok(())
}

#[test]
fn workers_reject_negative_values_at_parse() -> TestResult {
    assert_invalid(ShadowAlterConfig::from_toml("[workers]\npool_size = -1\n"), "config parse error")
}

// ============================================================================
// SECTION: Job Store
// ============================================================================

#[test]
fn job_store_memory_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.job_store.store_type = JobStoreType::Memory;
    config.job_store.path = Some(PathBuf::from("jobs.db"));
    assert_invalid(config.validate(), "memory job_store must not set path")
}

#[test]
fn job_store_sqlite_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.job_store.store_type = JobStoreType::Sqlite;
    config.job_store.path = None;
    assert_invalid(config.validate(), "sqlite job_store requires path")
}

#[test]
fn job_store_sqlite_rejects_zero_max_versions() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.job_store.store_type = JobStoreType::Sqlite;
    config.job_store.path = Some(PathBuf::from("jobs.db"));
    config.job_store.max_versions = Some(0);
    assert_invalid(config.validate(), "job_store max_versions must be greater than zero")
}

#[test]
fn job_store_sqlite_rejects_long_component() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.job_store.store_type = JobStoreType::Sqlite;
    config.job_store.path = Some(PathBuf::from("a".repeat(300)));
    assert_invalid(config.validate(), "job_store path component too long")
}

#[test]
fn job_store_rejects_unknown_type() -> TestResult {
    assert_invalid(ShadowAlterConfig::from_toml("[job_store]\ntype = \"redis\"\n"), "config parse error")
}

// ============================================================================
// SECTION: Audit
// ============================================================================

#[test]
fn file_audit_requires_path() -> TestResult {
    assert_invalid(
        ShadowAlterConfig::from_toml("[audit]\nsink = \"file\"\n"),
        "file audit sink requires audit.path",
    )
}

#[test]
fn file_audit_rejects_blank_path() -> TestResult {
    assert_invalid(
        ShadowAlterConfig::from_toml("[audit]\nsink = \"file\"\npath = \"  \"\n"),
        "audit.path must be non-empty",
    )
}

#[test]
fn non_file_audit_rejects_path() -> TestResult {
    assert_invalid(
        ShadowAlterConfig::from_toml("[audit]\nsink = \"none\"\npath = \"audit.jsonl\"\n"),
        "audit.path is only valid for the file sink",
    )
}

// crates/shadow-alter-core/tests/common/mod.rs
// ============================================================================
// Module: Shared Test Fixtures
// Description: Table builders, coordinator harnesses, and test runners.
// Purpose: Keep schema change integration tests short and consistent.
// ============================================================================

//! Shared fixtures for schema change integration tests.

#![allow(dead_code, reason = "Each test binary uses a different subset of fixtures.")]

use std::sync::Arc;
use std::sync::Mutex;

use shadow_alter_core::AlterOp;
use shadow_alter_core::AlterTableRequest;
use shadow_alter_core::ColumnDef;
use shadow_alter_core::ColumnType;
use shadow_alter_core::Coordinator;
use shadow_alter_core::CoordinatorConfig;
use shadow_alter_core::DispatchError;
use shadow_alter_core::InMemoryJobStore;
use shadow_alter_core::InMemoryShardStorage;
use shadow_alter_core::InMemoryTableCatalog;
use shadow_alter_core::InMemoryTransactionTracker;
use shadow_alter_core::InlineTaskRunner;
use shadow_alter_core::JobId;
use shadow_alter_core::JobStore;
use shadow_alter_core::KeysModel;
use shadow_alter_core::LiteralRow;
use shadow_alter_core::LocalTables;
use shadow_alter_core::RecordingAuditSink;
use shadow_alter_core::SchemaVersion;
use shadow_alter_core::TableId;
use shadow_alter_core::TableSchema;
use shadow_alter_core::TaskAssignment;
use shadow_alter_core::TaskReportKind;
use shadow_alter_core::TaskRunner;
use shadow_alter_core::Timestamp;
use shadow_alter_core::WorkerConfig;
use shadow_alter_core::run_conversion_task;

// ============================================================================
// SECTION: Schemas and Rows
// ============================================================================

/// Returns table id 1.
pub fn table_id() -> TableId {
    TableId::from_raw(1).expect("table id")
}

/// Builds a version-1 schema for table 1.
pub fn schema(keys_model: KeysModel, columns: Vec<ColumnDef>) -> TableSchema {
    TableSchema {
        table_id: table_id(),
        table_name: "t".to_string(),
        version: SchemaVersion::INITIAL,
        keys_model,
        columns,
    }
}

/// Builds literal rows from string slices; `"NULL"` becomes `None`.
pub fn rows(values: &[&[&str]]) -> Vec<LiteralRow> {
    values
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| if *value == "NULL" { None } else { Some((*value).to_string()) })
                .collect()
        })
        .collect()
}

/// Builds a single-operation modify request.
pub fn modify(column: ColumnDef) -> AlterTableRequest {
    AlterTableRequest {
        table_id: table_id(),
        ops: vec![AlterOp::ModifyColumn(column)],
    }
}

/// Returns a VARCHAR type.
pub const fn varchar(length: u32) -> ColumnType {
    ColumnType::Varchar {
        length,
    }
}

/// Returns a timestamp `millis` after a fixed epoch.
pub const fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(1_700_000_000_000 + millis)
}

/// Sorts rows for order-independent comparison.
pub fn sorted(mut rows: Vec<LiteralRow>) -> Vec<LiteralRow> {
    rows.sort();
    rows
}

// ============================================================================
// SECTION: Runners
// ============================================================================

/// Runner that holds assignments until a test runs them.
#[derive(Clone, Default)]
pub struct HoldingRunner {
    held: Arc<Mutex<Vec<TaskAssignment>>>,
}

impl HoldingRunner {
    /// Returns held assignments in submission order.
    pub fn held(&self) -> Vec<TaskAssignment> {
        self.held.lock().expect("held lock").clone()
    }
}

impl TaskRunner for HoldingRunner {
    fn submit(&self, assignment: TaskAssignment) -> Result<(), DispatchError> {
        self.held.lock().expect("held lock").push(assignment);
        Ok(())
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Coordinator over in-memory collaborators.
pub type LocalCoordinator<J, R> = Coordinator<
    InMemoryTableCatalog,
    InMemoryShardStorage,
    InMemoryTransactionTracker,
    J,
    R,
>;

/// Tables, store, audit sink, and a coordinator sharing them.
pub struct Harness<J, R> {
    pub tables: LocalTables,
    pub audit: Arc<RecordingAuditSink>,
    pub coordinator: LocalCoordinator<J, R>,
}

impl<J: JobStore, R: TaskRunner> Harness<J, R> {
    /// Builds a coordinator over `tables` with the given store and runner.
    pub fn with(tables: LocalTables, store: J, runner: R, config: CoordinatorConfig) -> Self {
        let audit = Arc::new(RecordingAuditSink::default());
        let coordinator = Coordinator::new(
            tables.catalog().clone(),
            tables.storage().clone(),
            tables.txns().clone(),
            store,
            runner,
            config,
        )
        .expect("coordinator")
        .with_audit(audit.clone())
        .with_locks(tables.locks().clone());
        Self {
            tables,
            audit,
            coordinator,
        }
    }

    /// Ticks until the job is terminal or the tick budget runs out.
    pub fn settle(&mut self, job_id: JobId, now: Timestamp) {
        for _ in 0 .. 10 {
            self.coordinator.tick(now).expect("tick");
            if self.coordinator.job(job_id).is_some_and(|job| job.state.is_terminal()) {
                return;
            }
        }
    }

    /// Returns the number of live storage units.
    pub fn units(&self) -> usize {
        self.tables.storage().handles().expect("handles").len()
    }

    /// Runs a held assignment on the calling thread.
    pub fn run(&self, assignment: &TaskAssignment) -> TaskReportKind {
        run_conversion_task(self.tables.storage(), assignment, &WorkerConfig::default())
    }

    /// Returns the event names recorded so far.
    pub fn events(&self) -> Vec<&'static str> {
        self.audit.events().iter().map(|event| event.event).collect()
    }
}

/// Harness with an inline runner and an in-memory store.
pub type InlineHarness = Harness<InMemoryJobStore, InlineTaskRunner<InMemoryShardStorage>>;

/// Creates a table and an inline harness over it.
pub fn inline_harness(
    table: TableSchema,
    shards: u64,
    config: CoordinatorConfig,
) -> (InlineHarness, InMemoryJobStore) {
    let tables = LocalTables::new();
    tables.create_table(table, shards).expect("create table");
    let store = InMemoryJobStore::new();
    let runner = InlineTaskRunner::new(
        tables.storage().clone(),
        WorkerConfig {
            batch_rows: 2,
            ..WorkerConfig::default()
        },
    );
    (Harness::with(tables, store.clone(), runner, config), store)
}

/// Harness whose tasks wait until a test runs them.
pub type HoldingHarness = Harness<InMemoryJobStore, HoldingRunner>;

/// Creates a table and a holding harness over it.
pub fn holding_harness(
    table: TableSchema,
    shards: u64,
    config: CoordinatorConfig,
) -> (HoldingHarness, HoldingRunner, InMemoryJobStore) {
    let tables = LocalTables::new();
    tables.create_table(table, shards).expect("create table");
    let store = InMemoryJobStore::new();
    let runner = HoldingRunner::default();
    (Harness::with(tables, store.clone(), runner.clone(), config), runner, store)
}

// crates/shadow-alter-cli/src/main.rs
// ============================================================================
// Module: Shadow Alter CLI Entry Point
// Description: Command dispatcher for matrix inspection, alter checks, and runs.
// Purpose: Drive schema changes against local tables from the command line.
// Dependencies: clap, shadow-alter-core, shadow-alter-config, serde, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `shadow-alter` binary exposes the type compatibility matrix, validates
//! alter requests against a table definition, runs a schema change end to end
//! over in-process tables, and lists jobs kept in a `SQLite` job store. All
//! user-facing strings are routed through the i18n catalog. Input files are
//! untrusted: reads are size-limited and JSON is parsed into typed requests.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shadow_alter_cli::t;
use shadow_alter_config::AuditConfig;
use shadow_alter_config::AuditSinkType;
use shadow_alter_config::CONFIG_ENV_VAR;
use shadow_alter_config::DEFAULT_CONFIG_NAME;
use shadow_alter_config::ShadowAlterConfig;
use shadow_alter_core::AlterJobStatus;
use shadow_alter_core::AlterTableRequest;
use shadow_alter_core::ColumnRole;
use shadow_alter_core::Coordinator;
use shadow_alter_core::FileAuditSink;
use shadow_alter_core::InMemoryJobStore;
use shadow_alter_core::JobAuditSink;
use shadow_alter_core::JobId;
use shadow_alter_core::JobState;
use shadow_alter_core::JobStore;
use shadow_alter_core::LiteralRow;
use shadow_alter_core::LocalTables;
use shadow_alter_core::NoopAuditSink;
use shadow_alter_core::SchemaChangeJob;
use shadow_alter_core::ShardStorage;
use shadow_alter_core::SharedJobStore;
use shadow_alter_core::StderrAuditSink;
use shadow_alter_core::TableCatalog;
use shadow_alter_core::TableId;
use shadow_alter_core::TableSchema;
use shadow_alter_core::TaskRunner;
use shadow_alter_core::Timestamp;
use shadow_alter_core::TransactionTracker;
use shadow_alter_core::TypeCategory;
use shadow_alter_core::Verdict;
use shadow_alter_core::WorkerPoolRunner;
use shadow_alter_core::hashing::canonical_json_bytes;
use shadow_alter_core::runtime::matrix::plan_alter;
use shadow_alter_core::runtime::matrix::verdict;
use shadow_alter_store_sqlite::SqliteJobStore;
use shadow_alter_store_sqlite::SqliteStoreConfig;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

// ============================================================================
// SECTION: Limits and Defaults
// ============================================================================

/// Maximum size of a table, rows, or alter input file.
const MAX_INPUT_BYTES: usize = 16 * 1024 * 1024;
/// Shard count used by `run` when `--shards` is not given.
const DEFAULT_SHARDS: u64 = 1;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "shadow-alter", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the type compatibility matrix.
    Matrix(MatrixCommand),
    /// Validate an alter request against a table definition.
    Check(CheckCommand),
    /// Run an alter end to end over in-process tables.
    Run(RunCommand),
    /// Job store utilities.
    Jobs {
        /// Selected jobs subcommand.
        #[command(subcommand)]
        command: JobsCommand,
    },
}

/// Column role filter for `matrix`.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum RoleArg {
    /// Key columns.
    Key,
    /// Value columns.
    Value,
}

impl From<RoleArg> for ColumnRole {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Key => Self::Key,
            RoleArg::Value => Self::Value,
        }
    }
}

/// Output formats for structured CLI commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `matrix`.
#[derive(Args, Debug)]
struct MatrixCommand {
    /// Only print cells for this column role.
    #[arg(long, value_enum)]
    role: Option<RoleArg>,
    /// Skip denied cells.
    #[arg(long, action = ArgAction::SetTrue)]
    allowed_only: bool,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
struct CheckCommand {
    /// Table definition JSON file.
    #[arg(long, value_name = "PATH")]
    table: PathBuf,
    /// Alter request JSON file.
    #[arg(long, value_name = "PATH")]
    alter: PathBuf,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Table definition JSON file.
    #[arg(long, value_name = "PATH")]
    table: PathBuf,
    /// Initial rows JSON file (array of arrays of literals or null).
    #[arg(long, value_name = "PATH")]
    rows: PathBuf,
    /// Alter request JSON file.
    #[arg(long, value_name = "PATH")]
    alter: PathBuf,
    /// Config file path (defaults to `SHADOW_ALTER_CONFIG` or `shadow-alter.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Number of shards the table is split into.
    #[arg(long, default_value_t = DEFAULT_SHARDS)]
    shards: u64,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Jobs subcommands.
#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List jobs kept in a `SQLite` job store, newest first.
    List(JobsListCommand),
}

/// Arguments for `jobs list`.
#[derive(Args, Debug)]
struct JobsListCommand {
    /// Only list jobs of this table.
    #[arg(long, value_name = "TABLE_ID")]
    table: Option<u64>,
    /// `SQLite` store path; overrides the config file.
    #[arg(long, value_name = "PATH", conflicts_with = "config")]
    store: Option<PathBuf>,
    /// Config file whose `[job_store]` names the store.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Matrix(command) => command_matrix(&command),
        Commands::Check(command) => command_check(&command),
        Commands::Run(command) => command_run(&command).await,
        Commands::Jobs {
            command,
        } => command_jobs(&command),
    }
}

/// Prints the top-level help text.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Matrix Command
// ============================================================================

/// Executes `matrix`.
fn command_matrix(command: &MatrixCommand) -> CliResult<ExitCode> {
    let roles = command.role.map_or_else(|| ColumnRole::ALL.to_vec(), |role| vec![role.into()]);
    let text = render_matrix_text(&roles, command.allowed_only);
    write_text(text)?;
    Ok(ExitCode::SUCCESS)
}

/// Renders one line per matrix cell for the requested roles.
fn render_matrix_text(roles: &[ColumnRole], allowed_only: bool) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("matrix.header"));
    buffer.push('\n');
    for role in roles {
        for source in TypeCategory::ALL {
            for target in TypeCategory::ALL {
                let line = match verdict(source, target, *role) {
                    Verdict::Allow(conversion, guard) => t!(
                        "matrix.allow",
                        role = role,
                        source = source.as_str(),
                        target = target.as_str(),
                        conversion = conversion.as_str(),
                        guard = guard.as_str()
                    ),
                    Verdict::Deny(_) if allowed_only => continue,
                    Verdict::Deny(reason) => t!(
                        "matrix.deny",
                        role = role,
                        source = source.as_str(),
                        target = target.as_str(),
                        reason = reason.as_str()
                    ),
                };
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
    }
    buffer
}

// ============================================================================
// SECTION: Check Command
// ============================================================================

/// Planned change for one column that exists before and after the alter.
#[derive(Serialize)]
struct ColumnPlanOutput {
    /// Lowercase column name.
    column: String,
    /// Storage impact label.
    rewrite: &'static str,
    /// Row conversion label.
    conversion: &'static str,
}

/// Output for `check`.
#[derive(Serialize)]
struct CheckOutput {
    /// Table name.
    table_name: String,
    /// Schema version before the alter.
    from_version: u64,
    /// Schema version the alter publishes.
    to_version: u64,
    /// Columns the request touches.
    touched: Vec<String>,
    /// Plans for columns present in both schemas.
    columns: Vec<ColumnPlanOutput>,
}

/// Executes `check`.
fn command_check(command: &CheckCommand) -> CliResult<ExitCode> {
    let schema: TableSchema = read_json_input(&command.table, "table")?;
    let request: AlterTableRequest = read_json_input(&command.alter, "alter")?;
    let output = check_alter(&schema, &request)?;
    let text = render_check_text(&output);
    emit_output(&output, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Validates `request` against `schema` the same way job submission does.
fn check_alter(schema: &TableSchema, request: &AlterTableRequest) -> CliResult<CheckOutput> {
    schema.validate().map_err(|err| CliError::new(t!("check.table_invalid", error = err)))?;
    let (target, touched) =
        schema.apply_alter(request).map_err(|err| CliError::new(t!("check.rejected", error = err)))?;
    let plans =
        plan_alter(schema, &target).map_err(|err| CliError::new(t!("check.rejected", error = err)))?;
    target.validate().map_err(|err| CliError::new(t!("check.rejected", error = err)))?;
    Ok(CheckOutput {
        table_name: schema.table_name.clone(),
        from_version: schema.version.get(),
        to_version: target.version.get(),
        touched,
        columns: plans
            .into_iter()
            .map(|(column, plan)| ColumnPlanOutput {
                column,
                rewrite: plan.kind.as_str(),
                conversion: plan.conversion.as_str(),
            })
            .collect(),
    })
}

/// Renders `check` output in text form.
fn render_check_text(output: &CheckOutput) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!(
        "check.accepted",
        table = output.table_name,
        from = output.from_version,
        to = output.to_version
    ));
    buffer.push('\n');
    for column in &output.columns {
        buffer.push_str(&t!(
            "check.column",
            column = column.column,
            rewrite = column.rewrite,
            conversion = column.conversion
        ));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Output for `run`.
#[derive(Serialize)]
struct RunOutput {
    /// Final job status.
    job: AlterJobStatus,
    /// Table rows after the job settled; NULL renders as `null`.
    rows: Vec<LiteralRow>,
}

/// Executes `run`.
async fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_run_config(command.config.as_deref())?;
    let schema: TableSchema = read_json_input(&command.table, "table")?;
    let rows: Vec<LiteralRow> = read_json_input(&command.rows, "rows")?;
    let request: AlterTableRequest = read_json_input(&command.alter, "alter")?;

    let table_id = schema.table_id;
    let tables = LocalTables::new();
    tables
        .create_table(schema, command.shards)
        .map_err(|err| CliError::new(t!("run.table_failed", error = err)))?;
    tables.insert(table_id, &rows).map_err(|err| CliError::new(t!("run.rows_failed", error = err)))?;

    let store = open_job_store(&config)?;
    let runner = WorkerPoolRunner::new(Arc::new(tables.storage().clone()), config.worker_config())
        .map_err(|err| CliError::new(t!("run.workers_failed", error = err)))?;
    let audit = build_audit_sink(&config.audit)?;
    let mut coordinator = Coordinator::new(
        tables.catalog().clone(),
        tables.storage().clone(),
        tables.txns().clone(),
        store,
        runner,
        config.coordinator_config(),
    )
    .map_err(|err| CliError::new(t!("run.coordinator_failed", error = err)))?
    .with_audit(audit)
    .with_locks(tables.locks().clone());

    let job_id = coordinator
        .submit_alter(&request, Timestamp::now())
        .map_err(|err| CliError::new(t!("run.rejected", error = err)))?;
    let job = drive_job(&mut coordinator, job_id, config.poll_interval()).await?;
    let rows =
        tables.read_text(table_id).map_err(|err| CliError::new(t!("run.read_failed", error = err)))?;

    let output = RunOutput {
        job,
        rows,
    };
    let text = render_run_text(&output);
    emit_output(&output, command.format, text)?;
    Ok(if output.job.state == JobState::Finished { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Ticks the coordinator until `job_id` is terminal. Ctrl-C cancels the job
/// once; ticking continues until the cancellation settles.
async fn drive_job<C, S, T, J, R>(
    coordinator: &mut Coordinator<C, S, T, J, R>,
    job_id: JobId,
    poll_interval: Duration,
) -> CliResult<AlterJobStatus>
where
    C: TableCatalog,
    S: ShardStorage,
    T: TransactionTracker,
    J: JobStore,
    R: TaskRunner,
{
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                coordinator
                    .tick(Timestamp::now())
                    .map_err(|err| CliError::new(t!("run.tick_failed", error = err)))?;
            }
            result = &mut shutdown, if !interrupted => {
                interrupted = true;
                result.map_err(|err| CliError::new(t!("run.signal_failed", error = err)))?;
                write_stderr_line(&t!("run.cancelling", job_id = job_id))
                    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
                if let Err(err) = coordinator.cancel(job_id, Timestamp::now()) {
                    write_stderr_line(&t!("run.cancel_failed", error = err))
                        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
                }
            }
        }
        let Some(job) = coordinator.job(job_id) else {
            return Err(CliError::new(t!("run.job_missing", job_id = job_id)));
        };
        if job.state.is_terminal() {
            return Ok(job.status());
        }
    }
}

/// Loads the config named by `path`, the environment, or the default file;
/// built-in defaults apply when none of them exist.
fn load_run_config(path: Option<&Path>) -> CliResult<ShadowAlterConfig> {
    let explicit = path.is_some() || std::env::var_os(CONFIG_ENV_VAR).is_some();
    if !explicit && !Path::new(DEFAULT_CONFIG_NAME).exists() {
        return Ok(ShadowAlterConfig::default());
    }
    load_config(path)
}

/// Loads and validates a config file.
fn load_config(path: Option<&Path>) -> CliResult<ShadowAlterConfig> {
    ShadowAlterConfig::load(path).map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Opens the job store selected by `[job_store]`.
fn open_job_store(config: &ShadowAlterConfig) -> CliResult<SharedJobStore> {
    match config.job_store.sqlite_config() {
        Some(sqlite) => SqliteJobStore::new(sqlite)
            .map(SharedJobStore::from_store)
            .map_err(|err| CliError::new(t!("store.open_failed", error = err))),
        None => Ok(SharedJobStore::from_store(InMemoryJobStore::new())),
    }
}

/// Builds the audit sink selected by `[audit]`.
fn build_audit_sink(config: &AuditConfig) -> CliResult<Arc<dyn JobAuditSink>> {
    match (config.sink, config.path.as_deref()) {
        (AuditSinkType::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkType::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkType::File, Some(path)) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| CliError::new(t!("audit.open_failed", path = path, error = err)))?;
            Ok(Arc::new(sink))
        }
        (AuditSinkType::File, None) => Err(CliError::new(t!("audit.path_missing"))),
    }
}

/// Renders `run` output in text form.
fn render_run_text(output: &RunOutput) -> String {
    let mut buffer = render_job_line(&output.job);
    buffer.push_str(&t!("run.rows.header", count = output.rows.len()));
    buffer.push('\n');
    for row in &output.rows {
        let cells: Vec<&str> = row.iter().map(|cell| cell.as_deref().unwrap_or("NULL")).collect();
        buffer.push_str(&cells.join("\t"));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Jobs Commands
// ============================================================================

/// Output for `jobs list`.
#[derive(Serialize)]
struct JobsListOutput {
    /// Job status rows, newest first.
    jobs: Vec<AlterJobStatus>,
}

/// Dispatches jobs subcommands.
fn command_jobs(command: &JobsCommand) -> CliResult<ExitCode> {
    match command {
        JobsCommand::List(command) => command_jobs_list(command),
    }
}

/// Executes `jobs list`.
fn command_jobs_list(command: &JobsListCommand) -> CliResult<ExitCode> {
    let config = resolve_store_config(command.store.as_deref(), command.config.as_deref())?;
    let store = SqliteJobStore::new(config)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))?;
    let table_id = command.table.map(parse_table_id).transpose()?;
    let output = JobsListOutput {
        jobs: list_job_statuses(&store, table_id)?,
    };
    let text = render_jobs_list_text(&output);
    emit_output(&output, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves the `SQLite` store from `--store` or the config's `[job_store]`.
fn resolve_store_config(
    store: Option<&Path>,
    config: Option<&Path>,
) -> CliResult<SqliteStoreConfig> {
    if let Some(path) = store {
        return Ok(SqliteStoreConfig::for_path(path));
    }
    load_config(config)?
        .job_store
        .sqlite_config()
        .ok_or_else(|| CliError::new(t!("jobs.sqlite_required")))
}

/// Returns status rows for stored jobs, newest first.
fn list_job_statuses(
    store: &impl JobStore,
    table_id: Option<TableId>,
) -> CliResult<Vec<AlterJobStatus>> {
    let mut jobs: Vec<AlterJobStatus> = store
        .list(table_id)
        .map_err(|err| CliError::new(t!("jobs.list_failed", error = err)))?
        .iter()
        .map(SchemaChangeJob::status)
        .collect();
    jobs.sort_by(|left, right| right.job_id.cmp(&left.job_id));
    Ok(jobs)
}

/// Parses a table id argument.
fn parse_table_id(raw: u64) -> CliResult<TableId> {
    TableId::from_raw(raw).ok_or_else(|| CliError::new(t!("jobs.table_invalid", table = raw)))
}

/// Renders `jobs list` output in text form.
fn render_jobs_list_text(output: &JobsListOutput) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("jobs.list.header"));
    buffer.push('\n');
    if output.jobs.is_empty() {
        buffer.push_str(&t!("jobs.list.none"));
        buffer.push('\n');
        return buffer;
    }
    for job in &output.jobs {
        buffer.push_str(&render_job_line(job));
    }
    buffer
}

/// Renders one job status row, plus its error when present.
fn render_job_line(job: &AlterJobStatus) -> String {
    let finished = job.finish_time.map_or_else(|| t!("job.unfinished"), |time| time.to_string());
    let mut buffer = t!(
        "job.entry",
        job_id = job.job_id,
        table = job.table_name,
        state = job.state,
        progress = job.progress,
        created = job.create_time,
        finished = finished
    );
    buffer.push('\n');
    if let Some(error) = &job.error {
        buffer.push_str(&t!("job.error", error = error));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses a JSON input file of the given kind.
fn read_json_input<T: DeserializeOwned>(path: &Path, kind: &str) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(t!("input.parse_failed", kind = kind, path = path.display(), error = err))
    })
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes `value` as canonical JSON or `text` depending on `format`.
fn emit_output<T: Serialize>(value: &T, format: OutputFormat, text: String) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let mut bytes = canonical_json_bytes(value)
                .map_err(|err| CliError::new(t!("output.serialize_failed", error = err)))?;
            bytes.push(b'\n');
            write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
        }
        OutputFormat::Text => write_text(text),
    }
}

/// Writes text to stdout, adding a trailing newline when missing.
fn write_text(mut text: String) -> CliResult<()> {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    write_stdout_bytes(text.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// crates/shadow-alter-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and translation utilities for the CLI.
// Purpose: Keep every user-facing string of the binary in one table.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! User-facing strings are looked up by key and rendered through the
//! [`t!`](crate::t) macro, which substitutes `{placeholder}` arguments.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys render as the key itself.
//! - Placeholder substitutions run in argument order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates.
    pub key: &'static str,
    /// The formatted value substituted for the placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// English catalog entries.
const CATALOG: &[(&str, &str)] = &[
    ("main.version", "shadow-alter {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.serialize_failed", "Failed to serialize output: {error}"),
    ("input.read_failed", "Failed to read {kind} file at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.parse_failed", "Failed to parse {kind} JSON at {path}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("store.open_failed", "Failed to open job store: {error}"),
    ("audit.open_failed", "Failed to open audit log at {path}: {error}"),
    ("audit.path_missing", "The file audit sink requires audit.path."),
    ("matrix.header", "Type compatibility matrix:"),
    ("matrix.allow", "[{role}] {source} -> {target}: allow {conversion} (guard {guard})"),
    ("matrix.deny", "[{role}] {source} -> {target}: deny {reason}"),
    ("check.table_invalid", "Table definition is invalid: {error}"),
    ("check.rejected", "Alter rejected: {error}"),
    ("check.accepted", "Alter accepted for table {table}: schema version {from} -> {to}"),
    ("check.column", "  {column}: {rewrite} ({conversion})"),
    ("run.table_failed", "Failed to create table: {error}"),
    ("run.rows_failed", "Failed to load rows: {error}"),
    ("run.workers_failed", "Failed to start workers: {error}"),
    ("run.coordinator_failed", "Failed to start coordinator: {error}"),
    ("run.rejected", "Alter rejected: {error}"),
    ("run.tick_failed", "Coordinator tick failed: {error}"),
    ("run.signal_failed", "Failed to listen for Ctrl-C: {error}"),
    ("run.cancelling", "Interrupted; cancelling job {job_id}."),
    ("run.cancel_failed", "Job could not be cancelled: {error}"),
    ("run.job_missing", "Job {job_id} is no longer tracked by the coordinator."),
    ("run.read_failed", "Failed to read table: {error}"),
    ("run.rows.header", "Rows ({count}):"),
    ("jobs.sqlite_required", "Listing jobs requires a sqlite job store (--store or [job_store])."),
    ("jobs.list_failed", "Failed to list jobs: {error}"),
    ("jobs.table_invalid", "Invalid table id: {table}"),
    ("jobs.list.header", "Alter jobs:"),
    ("jobs.list.none", "none"),
    (
        "job.entry",
        "job {job_id} table {table} state {state} progress {progress} created {created} finished \
         {finished}",
    ),
    ("job.unfinished", "-"),
    ("job.error", "  error: {error}"),
];

/// Returns the message catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CATALOG_MAP.get_or_init(|| CATALOG.iter().copied().collect())
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Renders `key` while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

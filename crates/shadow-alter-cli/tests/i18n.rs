// crates/shadow-alter-cli/tests/i18n.rs
// ============================================================================
// Module: CLI Message Catalog Tests
// Description: Exercises catalog lookup and placeholder substitution.
// Dependencies: shadow-alter-cli i18n module and the `t!` macro.
// ============================================================================

//! ## Overview
//! Validates the CLI catalog behavior:
//! - Message arguments capture key/value substitutions.
//! - Unknown keys render as the key.
//! - The [`t!`](shadow_alter_cli::t) macro formats placeholders correctly.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use shadow_alter_cli::i18n::MessageArg;
use shadow_alter_cli::i18n::translate;
use shadow_alter_cli::t;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn message_arg_new_captures_key_and_value() {
    let arg = MessageArg::new("path", "/tmp/table.json");
    assert_eq!(arg.key, "path");
    assert_eq!(arg.value, "/tmp/table.json");
}

#[test]
fn translate_substitutes_placeholders() {
    let args = vec![
        MessageArg::new("table", "orders"),
        MessageArg::new("from", "1"),
        MessageArg::new("to", "2"),
    ];
    assert_eq!(
        translate("check.accepted", args),
        "Alter accepted for table orders: schema version 1 -> 2"
    );
}

#[test]
fn translate_falls_back_to_key() {
    assert_eq!(translate("missing.key", Vec::new()), "missing.key");
}

#[test]
fn t_macro_formats_display_values() {
    let message = t!("run.cancelling", job_id = 7);
    assert_eq!(message, "Interrupted; cancelling job 7.");
    let message = t!("matrix.deny", role = "key", source = "INT", target = "FLOAT", reason = "incompatible",);
    assert_eq!(message, "[key] INT -> FLOAT: deny incompatible");
}

#[test]
fn unknown_placeholders_are_left_in_place() {
    assert_eq!(t!("config.load_failed"), "Failed to load config: {error}");
}

// crates/shadow-alter-cli/src/lib.rs
// ============================================================================
// Module: Shadow Alter CLI Library
// Description: Shared helpers for the Shadow Alter command-line interface.
// Purpose: Provide reusable components (i18n) for the CLI binary and tests.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! Houses the message catalog used by the `shadow-alter` binary so every
//! user-facing line goes through one place.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and the [`t!`] macro.
pub mod i18n;

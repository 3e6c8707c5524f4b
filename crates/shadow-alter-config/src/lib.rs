// crates/shadow-alter-config/src/lib.rs
// ============================================================================
// Module: Shadow Alter Config Library
// Description: Configuration model and validation.
// Purpose: Single source of truth for shadow-alter.toml semantics.
// Dependencies: shadow-alter-core, shadow-alter-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `shadow-alter-config` defines the configuration model for hosts that run
//! the schema change coordinator, and maps it onto the core and store
//! settings types.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;

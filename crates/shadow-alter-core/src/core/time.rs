// crates/shadow-alter-core/src/core/time.rs
// ============================================================================
// Module: Shadow Alter Time Model
// Description: Canonical timestamps for job records and scheduler ticks.
// Purpose: Keep timeout and retention decisions replayable in tests.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The coordinator never reads wall-clock time directly; hosts pass the
//! current time into every tick. This keeps timeout, retry, and retention
//! behavior deterministic under test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are supplied by callers; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    ///
    /// Only hosts call this; the core takes time as an argument.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))
    }

    /// Returns the unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp advanced by `millis`.
    #[must_use]
    pub const fn plus_millis(self, millis: u64) -> Self {
        let delta = if millis > i64::MAX as u64 { i64::MAX } else { millis as i64 };
        Self(self.0.saturating_add(delta))
    }

    /// Returns the milliseconds elapsed since `earlier` (zero if `earlier` is later).
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta < 0 { 0 } else { delta.unsigned_abs() }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// crates/shadow-alter-core/src/core/hashing.rs
// ============================================================================
// Module: Shadow Alter Content Hashing
// Description: Canonical JSON snapshots and SHA-256 digests.
// Purpose: Provide integrity digests for persisted jobs and converted rows.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Job snapshots are serialized as RFC 8785 canonical JSON before hashing so
//! that the same job always yields the same digest. Row digests are built by
//! [`DigestBuilder`] over the binary row encoding in scan order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable label stored alongside persisted digests.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a stored algorithm label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Default hash algorithm.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Hex-encoded content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    let mut builder = DigestBuilder::new(algorithm);
    builder.update(bytes);
    builder.finish()
}

/// Incremental digest over a sequence of byte chunks.
///
/// Each chunk is length-prefixed so chunk boundaries affect the digest.
#[derive(Debug, Clone)]
pub struct DigestBuilder {
    /// Algorithm recorded in the resulting digest.
    algorithm: HashAlgorithm,
    /// Running hasher state.
    hasher: Sha256,
}

impl DigestBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            hasher: Sha256::new(),
        }
    }

    /// Appends one chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(u64::try_from(chunk.len()).unwrap_or(u64::MAX).to_le_bytes());
        self.hasher.update(chunk);
    }

    /// Finalizes the digest.
    #[must_use]
    pub fn finish(self) -> HashDigest {
        match self.algorithm {
            HashAlgorithm::Sha256 => HashDigest::new(self.algorithm, &self.hasher.finalize()),
        }
    }
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

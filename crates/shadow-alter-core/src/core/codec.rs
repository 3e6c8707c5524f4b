// crates/shadow-alter-core/src/core/codec.rs
// ============================================================================
// Module: Shadow Alter Row Codec
// Description: Deterministic binary row encoding and row-set digests.
// Purpose: Compare converted rows byte for byte across backfill and replay.
// Dependencies: sha2 (via hashing)
// ============================================================================

//! ## Overview
//! Every value encodes as a one-byte tag followed by a fixed-width
//! little-endian payload, or a length-prefixed payload for text and decimals.
//! Floats encode their raw bits so that `-0.0` and `NaN` payloads remain
//! distinguishable. The encoding is stable; it is not a storage format.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::DigestBuilder;
use crate::core::hashing::HashDigest;
use crate::core::value::Value;

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Appends the encoding of one value to `out`.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(0),
        Value::Boolean(value) => {
            out.push(1);
            out.push(u8::from(*value));
        }
        Value::TinyInt(value) => {
            out.push(2);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Value::SmallInt(value) => {
            out.push(3);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Value::Int(value) => {
            out.push(4);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Value::BigInt(value) => {
            out.push(5);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Value::LargeInt(value) => {
            out.push(6);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Value::Float(value) => {
            out.push(7);
            out.extend_from_slice(&value.to_bits().to_le_bytes());
        }
        Value::Double(value) => {
            out.push(8);
            out.extend_from_slice(&value.to_bits().to_le_bytes());
        }
        Value::Decimal(value) => {
            out.push(9);
            encode_bytes(value.to_plain_string().as_bytes(), out);
        }
        Value::Date(value) => {
            out.push(10);
            out.extend_from_slice(&value.to_julian_day().to_le_bytes());
        }
        Value::DateTime(value) => {
            out.push(11);
            out.extend_from_slice(&value.date().to_julian_day().to_le_bytes());
            let (hour, minute, second, nano) = value.time().as_hms_nano();
            out.extend_from_slice(&[hour, minute, second]);
            out.extend_from_slice(&nano.to_le_bytes());
        }
        Value::Text(value) => {
            out.push(12);
            encode_bytes(value.as_bytes(), out);
        }
    }
}

/// Encodes a row.
#[must_use]
pub fn encode_row(row: &[Value]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() * 9);
    out.extend_from_slice(&u64::try_from(row.len()).unwrap_or(u64::MAX).to_le_bytes());
    for value in row {
        encode_value(value, &mut out);
    }
    out
}

/// Returns the digest of a row sequence in iteration order.
#[must_use]
pub fn digest_rows<'a, I>(rows: I) -> HashDigest
where
    I: IntoIterator<Item = &'a [Value]>,
{
    let mut builder = DigestBuilder::new(DEFAULT_HASH_ALGORITHM);
    for row in rows {
        builder.update(&encode_row(row));
    }
    builder.finish()
}

/// Appends a length-prefixed byte payload.
fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&u64::try_from(bytes.len()).unwrap_or(u64::MAX).to_le_bytes());
    out.extend_from_slice(bytes);
}

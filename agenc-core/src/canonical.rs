//! Canonical serialization and content hashing.
//!
//! Every hash in the replay pipeline is computed over the canonical JSON
//! form of a value: object keys sorted, compact separators, no trailing
//! whitespace. `serde_json`'s `Map` is BTreeMap-backed (the `preserve_order`
//! feature must never be enabled in this workspace), so serializing a
//! `Value` already yields key-sorted output. `stable_stringify` exists as
//! the single entry point so that byte-stability is a property of one
//! function rather than a convention scattered across crates.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{AgencResult, ParseError};

/// SHA-256 content hash as raw bytes.
pub type ContentHash = [u8; 32];

/// Serialize any JSON value to its canonical byte form.
///
/// Logically-equal structures produce identical output regardless of the
/// order in which fields were inserted. Arrays preserve element order;
/// only object keys are normalized.
pub fn stable_stringify(value: &Value) -> String {
    // Map keys are already sorted by the BTreeMap-backed serde_json::Map.
    // to_string is compact (no spaces), which is the canonical form.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Convert a serializable value to canonical JSON text.
///
/// # Errors
///
/// Returns a `ParseError` if the value cannot be represented as JSON
/// (e.g. a map with non-string keys or a non-finite float).
pub fn canonical_json<T: Serialize>(value: &T) -> AgencResult<String> {
    let v = serde_json::to_value(value).map_err(|e| ParseError::Serialization {
        reason: e.to_string(),
    })?;
    Ok(stable_stringify(&v))
}

/// Compute the SHA-256 hash of raw content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// SHA-256 of raw content, hex-encoded (64 characters).
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(compute_content_hash(content))
}

/// SHA-256 of a serializable value's canonical JSON form, hex-encoded.
pub fn hash_canonical<T: Serialize>(value: &T) -> AgencResult<String> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Derive a short (16 hex chars) identifier from labeled parts.
///
/// Used for trace and span ids: the same parts always produce the same id,
/// independent of host or process.
pub fn derive_short_id(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part.as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Map a seed string into `[0, 1)` deterministically.
///
/// The first eight bytes of the seed's SHA-256 digest are interpreted as a
/// big-endian u64 and scaled by 2^-64. Used for deterministic sampling:
/// comparing the result against a sample rate yields the same decision for
/// the same seed on every host.
pub fn hash_to_unit_interval(seed: &str) -> f64 {
    let digest = compute_content_hash(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(bytes);
    (n as f64) / (u64::MAX as f64 + 1.0)
}

// =============================================================================
// TESTS
// =============================================================================

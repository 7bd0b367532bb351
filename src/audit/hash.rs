//! Hash Encoding and Pairwise Combination
//!
//! Canonical hex <-> binary conversion for the 32-byte digests carried in
//! anchors and proofs, and the pairwise hash used at every tree level.

use sha2::{Digest, Sha256};

use crate::error::{AnchorError, Result};

/// A SHA-256 digest.
pub type Hash32 = [u8; 32];

/// Decode a hex string, accepting an optional `0x` prefix.
///
/// `field` names the value being decoded so that a failure points at the
/// exact proof or anchor field that was malformed.
pub fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    let digits = strip_prefix(value);

    if digits.len() % 2 != 0 {
        return Err(AnchorError::malformed_hash(
            field,
            format!("odd number of hex digits ({})", digits.len()),
        ));
    }

    hex::decode(digits).map_err(|e| AnchorError::malformed_hash(field, e.to_string()))
}

/// Decode a hex string that must hold exactly one 32-byte digest.
pub fn decode_hash(field: &str, value: &str) -> Result<Hash32> {
    let bytes = decode(field, value)?;
    let len = bytes.len();

    bytes.try_into().map_err(|_| {
        AnchorError::malformed_hash(field, format!("expected 32 bytes, got {}", len))
    })
}

/// Encode bytes as lowercase hex with a `0x` prefix.
pub fn encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash two sibling nodes into their parent.
///
/// The operands are ordered by unsigned byte-wise comparison before
/// concatenation, so `combine(a, b) == combine(b, a)`.
pub fn combine(left: &Hash32, right: &Hash32) -> Hash32 {
    let (first, second) = if left <= right {
        (left, right)
    } else {
        (right, left)
    };

    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}

fn strip_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

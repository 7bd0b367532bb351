//! Merkle Inclusion Proofs
//!
//! Recomputes a batch root from a record hash, its sibling path and its
//! leaf index. Tree construction happens in the anchoring service; this
//! module only consumes the proofs it issues.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::hash::{self, Hash32};
use crate::error::Result;

/// Inclusion proof for a single audit record, as issued by the audit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Hash of the record being proven (the leaf).
    pub content_hash: String,
    /// Sibling hashes ordered from the leaf level up to the root.
    pub proof_path: Vec<String>,
    /// Zero-based position of the leaf when the batch was committed.
    pub leaf_index: u64,
    /// Expected root; should match the root of some anchor.
    pub merkle_root: String,
}

/// An inclusion proof with every hash decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProof {
    pub content_hash: Hash32,
    pub proof_path: Vec<Hash32>,
    pub leaf_index: u64,
    pub merkle_root: Hash32,
}

impl InclusionProof {
    /// Decode every hex field, failing on the first malformed one.
    pub fn decode(&self) -> Result<DecodedProof> {
        let content_hash = hash::decode_hash("content_hash", &self.content_hash)?;
        let proof_path = self
            .proof_path
            .iter()
            .enumerate()
            .map(|(i, sibling)| hash::decode_hash(&format!("proof_path[{}]", i), sibling))
            .collect::<Result<Vec<_>>>()?;
        let merkle_root = hash::decode_hash("merkle_root", &self.merkle_root)?;

        Ok(DecodedProof {
            content_hash,
            proof_path,
            leaf_index: self.leaf_index,
            merkle_root,
        })
    }

    /// Verify this proof by recomputing its root.
    pub fn verify(&self) -> Result<bool> {
        verify_inclusion(self)
    }

    /// Ways in which this proof does not look like it came from a tree of
    /// `leaf_count` leaves. Verification does not depend on these checks.
    pub fn shape_warnings(&self, leaf_count: u64) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.leaf_index >= leaf_count {
            warnings.push(format!(
                "leaf_index {} is outside a batch of {} leaves",
                self.leaf_index, leaf_count
            ));
        }

        let depth = tree_depth(leaf_count);
        if self.proof_path.len() as u32 != depth {
            warnings.push(format!(
                "proof_path has {} siblings, a batch of {} leaves has depth {}",
                self.proof_path.len(),
                leaf_count,
                depth
            ));
        }

        warnings
    }

    pub fn summary(&self) -> String {
        format!(
            "Inclusion proof: leaf {} with {} siblings, root: {}",
            self.leaf_index,
            self.proof_path.len(),
            self.merkle_root
        )
    }
}

impl DecodedProof {
    /// Walk the sibling path and return the recomputed root.
    pub fn recompute_root(&self) -> Hash32 {
        let mut current = self.content_hash;
        let mut index = self.leaf_index;

        for sibling in &self.proof_path {
            current = if index % 2 == 0 {
                hash::combine(&current, sibling)
            } else {
                hash::combine(sibling, &current)
            };
            index /= 2;
        }

        current
    }

    pub fn verify(&self) -> bool {
        self.recompute_root() == self.merkle_root
    }
}

/// Verify an inclusion proof.
///
/// Malformed hex is an error; a well-formed proof whose recomputed root
/// differs from `merkle_root` is `Ok(false)`. The leaf index only drives
/// operand parity, so an index the path cannot support yields a mismatch.
pub fn verify_inclusion(proof: &InclusionProof) -> Result<bool> {
    let decoded = proof.decode()?;
    let recomputed = decoded.recompute_root();
    let valid = recomputed == decoded.merkle_root;

    debug!(
        "Recomputed root {} for leaf {} (expected {}): {}",
        hash::encode(&recomputed),
        proof.leaf_index,
        proof.merkle_root,
        if valid { "match" } else { "mismatch" }
    );

    Ok(valid)
}

/// Depth of a tree holding `leaf_count` leaves, `ceil(log2(leaf_count))`.
pub fn tree_depth(leaf_count: u64) -> u32 {
    if leaf_count <= 1 {
        0
    } else {
        64 - (leaf_count - 1).leading_zeros()
    }
}

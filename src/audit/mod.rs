//! Audit Anchor Integrity
//!
//! Anchors commit batches of audit records to a blockchain through their
//! Merkle root. This module holds the anchor model, the inclusion proof
//! format and the two ways of verifying a proof.

pub mod anchor;
pub mod hash;
pub mod merkle;
pub mod verify;

pub use anchor::{AnchorFilter, AnchorRecord, AnchorStatus, AnchorTracker};
pub use hash::Hash32;
pub use merkle::{verify_inclusion, InclusionProof};
pub use verify::{
    verify_local, verify_local_input, ChainDetails, ProofInput, ProofVerifier,
    VerificationMode, VerificationOutcome,
};

#![allow(dead_code)]

use audit_anchor::audit::hash::{combine, encode, sha256, Hash32};
use audit_anchor::audit::InclusionProof;
use audit_anchor::AuditClient;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::MockServer;

/// Leaf hashes for `count` synthetic audit records.
pub fn record_hashes(count: usize) -> Vec<Hash32> {
    (0..count)
        .map(|i| sha256(format!("record-{}", i).as_bytes()))
        .collect()
}

/// Proof for leaf 1 of a two-leaf batch built from `record-41` and `record-42`.
pub fn two_leaf_proof() -> InclusionProof {
    let l0 = sha256(b"record-41");
    let content = sha256(b"record-42");

    InclusionProof {
        content_hash: encode(&content),
        proof_path: vec![encode(&l0)],
        leaf_index: 1,
        merkle_root: encode(&combine(&l0, &content)),
    }
}

/// Proof for leaf 0 of a four-leaf batch.
pub fn four_leaf_proof() -> InclusionProof {
    let l = record_hashes(4);
    let right = combine(&l[2], &l[3]);
    let root = combine(&combine(&l[0], &l[1]), &right);

    InclusionProof {
        content_hash: encode(&l[0]),
        proof_path: vec![encode(&l[1]), encode(&right)],
        leaf_index: 0,
        merkle_root: encode(&root),
    }
}

pub fn anchor_json(id: u64, status: &str) -> Value {
    let tx_hash = (status != "pending").then(|| format!("0x{:064x}", id));
    let explorer_url = tx_hash
        .as_ref()
        .map(|tx| format!("https://amoy.polygonscan.com/tx/{}", tx));

    json!({
        "id": id,
        "status": status,
        "merkle_root": encode(&sha256(format!("batch-{}", id).as_bytes())),
        "leaf_count": 16,
        "network": "polygon_amoy",
        "tx_hash": tx_hash,
        "explorer_url": explorer_url,
        "created_at": "2025-01-15T10:00:00Z"
    })
}

pub fn client_for(server: &MockServer) -> AuditClient {
    AuditClient::new(&server.uri(), Duration::from_secs(5)).expect("Failed to create client")
}

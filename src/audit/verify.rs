//! Proof Verification
//!
//! Two independent ways of checking an inclusion proof:
//!
//! - **local**: recompute the root from the proof alone. A pass means the
//!   proof is self-consistent, not that its root was ever anchored.
//! - **remote**: hand the proof to the audit service, which also checks the
//!   anchoring transaction on chain.
//!
//! The caller picks the mode. Neither mode falls back to the other.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::audit::merkle::{verify_inclusion, InclusionProof};
use crate::client::{AuditClient, RemoteVerification};
use crate::error::{AnchorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    Local,
    Remote,
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMode::Local => f.write_str("local"),
            VerificationMode::Remote => f.write_str("remote"),
        }
    }
}

/// Where and when a verified root was confirmed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainDetails {
    pub network: Option<String>,
    pub block_number: Option<u64>,
    pub block_timestamp: Option<DateTime<Utc>>,
    pub explorer_url: Option<String>,
}

/// Result of a verification run in either mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub mode: VerificationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_details: Option<ChainDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl VerificationOutcome {
    pub fn local(valid: bool) -> Self {
        Self {
            valid,
            mode: VerificationMode::Local,
            chain_details: None,
            failure_reason: (!valid)
                .then(|| "recomputed root does not match merkle_root".to_string()),
        }
    }

    /// Normalize the audit service's answer.
    ///
    /// Chain details are only kept for a valid proof the service also
    /// confirmed on chain; a valid but unconfirmed proof stays valid.
    pub fn from_remote(response: RemoteVerification) -> Self {
        if !response.verified {
            return Self {
                valid: false,
                mode: VerificationMode::Remote,
                chain_details: None,
                failure_reason: Some(
                    response
                        .error
                        .unwrap_or_else(|| "audit service did not verify the proof".to_string()),
                ),
            };
        }

        let chain_details = response.blockchain_verified.then(|| ChainDetails {
            network: response.network,
            block_number: response.block_number,
            block_timestamp: response.block_timestamp,
            explorer_url: response.explorer_url,
        });

        Self {
            valid: true,
            mode: VerificationMode::Remote,
            chain_details,
            failure_reason: None,
        }
    }

    /// Whether the root was confirmed on chain as part of this run.
    pub fn is_anchored(&self) -> bool {
        self.chain_details.is_some()
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if !self.valid {
            return format!(
                "INVALID ({}): {}",
                self.mode,
                self.failure_reason.as_deref().unwrap_or("Unknown error")
            );
        }

        match (&self.mode, &self.chain_details) {
            (VerificationMode::Local, _) => {
                "VALID (local): proof is self-consistent, not checked against any chain".to_string()
            }
            (VerificationMode::Remote, None) => {
                "VALID (remote): proof verified, blockchain confirmation not yet available"
                    .to_string()
            }
            (VerificationMode::Remote, Some(chain)) => {
                let mut summary = format!(
                    "VALID (remote): anchored on {}",
                    chain.network.as_deref().unwrap_or("unknown network")
                );
                if let Some(block) = chain.block_number {
                    summary.push_str(&format!(" at block {}", block));
                }
                if let Some(timestamp) = chain.block_timestamp {
                    summary.push_str(&format!(" ({})", timestamp.to_rfc3339()));
                }
                if let Some(url) = &chain.explorer_url {
                    summary.push_str(&format!("\n  Explorer: {}", url));
                }
                summary
            }
        }
    }
}

/// Proof supplied by a user: either JSON text or a path to a JSON file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofInput {
    Literal(String),
    File(String),
}

impl ProofInput {
    /// Anything that starts with `{`, `[` or `"` after whitespace is taken
    /// as JSON text.
    pub fn from_arg(arg: &str) -> Self {
        if arg.trim_start().starts_with(['{', '[', '"']) {
            ProofInput::Literal(arg.to_string())
        } else {
            ProofInput::File(arg.to_string())
        }
    }

    /// Parse the proof with strict JSON rules.
    ///
    /// Failures here mean no proof was evaluated, which is not the same as
    /// a proof that failed verification.
    pub fn parse(&self) -> Result<InclusionProof> {
        match self {
            ProofInput::Literal(json) => parse_proof_json(json, "proof argument"),
            ProofInput::File(path) => {
                let contents = std::fs::read_to_string(Path::new(path)).map_err(|source| {
                    AnchorError::ProofInputUnreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                parse_proof_json(&contents, path)
            }
        }
    }
}

impl FromStr for ProofInput {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_arg(s))
    }
}

fn parse_proof_json(json: &str, origin: &str) -> Result<InclusionProof> {
    serde_json::from_str(json)
        .map_err(|e| AnchorError::MalformedProofInput(format!("{}: {}", origin, e)))
}

/// Coordinates local and remote verification.
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    client: AuditClient,
}

impl ProofVerifier {
    pub fn new(client: AuditClient) -> Self {
        Self { client }
    }

    /// Verify `proof` in the requested mode.
    ///
    /// Remote transport failures are returned as errors so that "could not
    /// ask" stays distinct from "asked and the proof is invalid".
    pub async fn verify(
        &self,
        proof: &InclusionProof,
        mode: VerificationMode,
    ) -> Result<VerificationOutcome> {
        match mode {
            VerificationMode::Local => verify_local(proof),
            VerificationMode::Remote => self.verify_remote(proof).await,
        }
    }

    pub async fn verify_remote(&self, proof: &InclusionProof) -> Result<VerificationOutcome> {
        let response = self.client.verify_proof(proof).await?;

        if response.verified && response.proof_valid == Some(false) {
            warn!("Audit service verified a proof it also reports as invalid");
        }

        let outcome = VerificationOutcome::from_remote(response);
        info!("Remote verification: {}", outcome.summary());
        Ok(outcome)
    }

    /// Parse user input and verify it in the requested mode.
    pub async fn verify_input(
        &self,
        input: &ProofInput,
        mode: VerificationMode,
    ) -> Result<VerificationOutcome> {
        let proof = input.parse()?;
        self.verify(&proof, mode).await
    }
}

/// Verify a proof without touching the network.
pub fn verify_local(proof: &InclusionProof) -> Result<VerificationOutcome> {
    info!("Verifying {} locally", proof.summary());
    let valid = verify_inclusion(proof)?;
    Ok(VerificationOutcome::local(valid))
}

/// Parse and locally verify a proof supplied as JSON text or a file path.
pub fn verify_local_input(input: &ProofInput) -> Result<VerificationOutcome> {
    let proof = input.parse()?;
    verify_local(&proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::hash::{combine, encode, sha256};
    use std::time::Duration;

    fn scenario_proof() -> InclusionProof {
        let l0 = sha256(b"record-41");
        let content = sha256(b"record-42");
        InclusionProof {
            content_hash: encode(&content),
            proof_path: vec![encode(&l0)],
            leaf_index: 1,
            merkle_root: encode(&combine(&l0, &content)),
        }
    }

    fn remote(verified: bool, blockchain_verified: bool) -> RemoteVerification {
        RemoteVerification {
            verified,
            proof_valid: Some(verified),
            blockchain_verified,
            network: Some("polygon_amoy".to_string()),
            block_number: Some(4_812_733),
            block_timestamp: None,
            explorer_url: Some("https://amoy.polygonscan.com/tx/0xfeed".to_string()),
            error: None,
        }
    }

    #[test]
    fn test_local_scenario_is_valid() {
        let outcome = verify_local(&scenario_proof()).unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.mode, VerificationMode::Local);
        assert!(outcome.chain_details.is_none());
        assert!(outcome.failure_reason.is_none());
        assert!(outcome.summary().contains("not checked against any chain"));
    }

    #[test]
    fn test_local_mismatch_is_outcome_not_error() {
        let mut proof = scenario_proof();
        proof.merkle_root = encode(&sha256(b"some other root"));

        let outcome = verify_local(&proof).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.failure_reason.is_some());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let input = ProofInput::from_arg("{\"content_hash\": \"0xab\", ");
        assert!(matches!(input, ProofInput::Literal(_)));
        assert!(matches!(
            verify_local_input(&input),
            Err(AnchorError::MalformedProofInput(_))
        ));

        // Trailing commas are not accepted.
        let json = serde_json::to_string(&scenario_proof()).unwrap();
        let lenient = format!("{},}}", json.trim_end_matches('}'));
        assert!(matches!(
            ProofInput::Literal(lenient).parse(),
            Err(AnchorError::MalformedProofInput(_))
        ));
    }

    #[test]
    fn test_non_object_json_is_parse_error() {
        for arg in ["[\"0xab\", \"0xcd\"]", "\"0xab\"", "  [1, 2]"] {
            let input = ProofInput::from_arg(arg);
            assert!(matches!(input, ProofInput::Literal(_)), "{}", arg);
            assert!(matches!(
                input.parse(),
                Err(AnchorError::MalformedProofInput(_))
            ));
        }
    }

    #[test]
    fn test_proof_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        std::fs::write(&path, serde_json::to_vec(&scenario_proof()).unwrap()).unwrap();

        let input = ProofInput::from_arg(path.to_str().unwrap());
        assert!(matches!(input, ProofInput::File(_)));
        assert!(verify_local_input(&input).unwrap().valid);

        let missing = ProofInput::from_arg("/nonexistent/proof.json");
        assert!(matches!(
            missing.parse(),
            Err(AnchorError::ProofInputUnreadable { .. })
        ));
    }

    #[test]
    fn test_remote_valid_without_chain_confirmation() {
        let outcome = VerificationOutcome::from_remote(remote(true, false));
        assert!(outcome.valid);
        assert_eq!(outcome.mode, VerificationMode::Remote);
        assert!(outcome.chain_details.is_none());
        assert!(!outcome.is_anchored());
    }

    #[test]
    fn test_remote_valid_with_chain_confirmation() {
        let outcome = VerificationOutcome::from_remote(remote(true, true));
        let chain = outcome.chain_details.as_ref().unwrap();
        assert_eq!(chain.network.as_deref(), Some("polygon_amoy"));
        assert_eq!(chain.block_number, Some(4_812_733));
        assert!(outcome.summary().contains("block 4812733"));
    }

    #[test]
    fn test_remote_invalid_carries_reason() {
        let mut response = remote(false, true);
        response.error = Some("Merkle root mismatch".to_string());

        let outcome = VerificationOutcome::from_remote(response);
        assert!(!outcome.valid);
        assert!(outcome.chain_details.is_none());
        assert_eq!(outcome.failure_reason.as_deref(), Some("Merkle root mismatch"));
    }

    #[test]
    fn test_verifier_local_mode() {
        let client = AuditClient::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        let verifier = ProofVerifier::new(client);

        let outcome =
            tokio_test::block_on(verifier.verify(&scenario_proof(), VerificationMode::Local))
                .unwrap();
        assert!(outcome.valid);
    }
}

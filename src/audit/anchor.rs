//! Anchor Records and Lifecycle
//!
//! An anchor is one batch Merkle root committed to a blockchain
//! transaction. The anchoring service owns the state machine; this module
//! classifies what it reports and checks that what it reports is coherent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::audit::hash::{self, Hash32};
use crate::error::{AnchorError, Result};

/// Largest page the listing endpoint will be asked for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Anchor status as reported by the anchoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorStatus::Pending => "pending",
            AnchorStatus::Submitted => "submitted",
            AnchorStatus::Confirmed => "confirmed",
            AnchorStatus::Failed => "failed",
        }
    }

    /// Confirmed and failed anchors never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnchorStatus::Confirmed | AnchorStatus::Failed)
    }

    /// Whether the service may report `next` after having reported `self`.
    ///
    /// Repeating the same status is always allowed. Forward moves may skip
    /// `submitted` because polling can miss the intermediate state.
    pub fn can_transition_to(&self, next: AnchorStatus) -> bool {
        use AnchorStatus::*;

        match (*self, next) {
            (a, b) if a == b => true,
            (Pending, Submitted) | (Pending, Confirmed) | (Pending, Failed) => true,
            (Submitted, Confirmed) | (Submitted, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorStatus {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(AnchorStatus::Pending),
            "submitted" => Ok(AnchorStatus::Submitted),
            "confirmed" => Ok(AnchorStatus::Confirmed),
            "failed" => Ok(AnchorStatus::Failed),
            other => Err(AnchorError::UnknownStatus(other.to_string())),
        }
    }
}

/// One batch commitment, validated against the lifecycle invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    pub id: String,
    pub status: AnchorStatus,
    pub merkle_root: Hash32,
    pub leaf_count: u64,
    pub network: String,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Anchor exactly as it arrives over the wire, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnchor {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub status: String,
    pub merkle_root: String,
    pub leaf_count: u64,
    pub network: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub explorer_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RawAnchor> for AnchorRecord {
    type Error = AnchorError;

    fn try_from(raw: RawAnchor) -> Result<Self> {
        let status: AnchorStatus = raw.status.parse()?;
        let merkle_root = hash::decode_hash("merkle_root", &raw.merkle_root)?;

        // Empty strings from the service mean "not set".
        let tx_hash = raw.tx_hash.filter(|s| !s.is_empty());
        let explorer_url = raw.explorer_url.filter(|s| !s.is_empty());

        let record = AnchorRecord {
            id: raw.id,
            status,
            merkle_root,
            leaf_count: raw.leaf_count,
            network: raw.network,
            tx_hash,
            explorer_url,
            created_at: raw.created_at,
        };
        record.validate()?;
        Ok(record)
    }
}

impl AnchorRecord {
    /// Check the invariants tying `status`, `tx_hash` and `explorer_url`.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_count == 0 {
            return Err(AnchorError::inconsistent_anchor(
                &self.id,
                "leaf_count must be at least 1",
            ));
        }

        match (self.status, &self.tx_hash) {
            (AnchorStatus::Pending, Some(tx)) => {
                return Err(AnchorError::inconsistent_anchor(
                    &self.id,
                    format!("pending anchor already carries tx_hash {}", tx),
                ));
            }
            (status, None) if status != AnchorStatus::Pending => {
                return Err(AnchorError::inconsistent_anchor(
                    &self.id,
                    format!("{} anchor has no tx_hash", status),
                ));
            }
            _ => {}
        }

        if self.tx_hash.is_none() && self.explorer_url.is_some() {
            return Err(AnchorError::inconsistent_anchor(
                &self.id,
                "explorer_url present without tx_hash",
            ));
        }

        Ok(())
    }

    pub fn merkle_root_hex(&self) -> String {
        hash::encode(&self.merkle_root)
    }

    /// Whether `root` (hex, optionally prefixed) is this anchor's root.
    pub fn anchors_root(&self, root: &str) -> Result<bool> {
        Ok(hash::decode_hash("merkle_root", root)? == self.merkle_root)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}] {} leaves on {}, root: {}",
            self.id,
            self.status,
            self.leaf_count,
            self.network,
            self.merkle_root_hex()
        )
    }
}

/// Filters accepted by the anchor listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorFilter {
    pub status: Option<AnchorStatus>,
    pub network: Option<String>,
    limit: Option<u32>,
}

impl AnchorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: AnchorStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.clamp(1, MAX_PAGE_SIZE));
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Query pairs for the listing request, page number included.
    pub fn query_pairs(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(network) = &self.network {
            pairs.push(("network", network.clone()));
        }
        pairs.push(("limit", self.limit().to_string()));
        pairs.push(("page", page.to_string()));
        pairs
    }
}

/// Pagination metadata returned alongside a page of anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One page of anchors in the order the service returned them.
#[derive(Debug, Clone)]
pub struct AnchorPage {
    pub anchors: Vec<AnchorRecord>,
    pub pagination: Pagination,
}

/// Remembers the last status seen for each anchor and rejects observations
/// that would move an anchor backwards or out of a terminal state.
#[derive(Debug, Default)]
pub struct AnchorTracker {
    seen: HashMap<String, AnchorStatus>,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. Returns the previous status when it changed.
    pub fn observe(&mut self, anchor: &AnchorRecord) -> Result<Option<AnchorStatus>> {
        match self.seen.get(&anchor.id).copied() {
            None => {
                debug!("Tracking anchor {} at {}", anchor.id, anchor.status);
                self.seen.insert(anchor.id.clone(), anchor.status);
                Ok(None)
            }
            Some(previous) if previous == anchor.status => Ok(None),
            Some(previous) if previous.can_transition_to(anchor.status) => {
                info!("Anchor {}: {} -> {}", anchor.id, previous, anchor.status);
                self.seen.insert(anchor.id.clone(), anchor.status);
                Ok(Some(previous))
            }
            Some(previous) => Err(AnchorError::IllegalTransition {
                id: anchor.id.clone(),
                from: previous,
                to: anchor.status,
            }),
        }
    }

    pub fn status_of(&self, id: &str) -> Option<AnchorStatus> {
        self.seen.get(id).copied()
    }
}

fn opaque_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "anchor id must be a string or number, got {}",
            other
        ))),
    }
}

//! Audit Service Client
//!
//! HTTP access to the remote audit service: anchor listing, proof issue,
//! server-side proof verification and compliance report rendering. Every
//! call is a single request; nothing is retried here.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::audit::anchor::{
    AnchorFilter, AnchorPage, AnchorRecord, AnchorTracker, Pagination, RawAnchor,
};
use crate::audit::merkle::InclusionProof;
use crate::config::AppConfig;
use crate::error::{AnchorError, Result};
use crate::export::ExportRequest;

const API_PREFIX: [&str; 3] = ["api", "v1", "audit"];

/// Which kind of audit record a proof is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    AuditLog,
    AiAuditLog,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::AuditLog => "audit_log",
            RecordKind::AiAuditLog => "ai_audit_log",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "audit_log" => Ok(RecordKind::AuditLog),
            "ai_audit_log" => Ok(RecordKind::AiAuditLog),
            _ => Err(format!(
                "Invalid record type: {} (expected audit-log or ai-audit-log)",
                s
            )),
        }
    }
}

/// Body of the service's verification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteVerification {
    pub verified: bool,
    #[serde(default)]
    pub proof_valid: Option<bool>,
    #[serde(default)]
    pub blockchain_verified: bool,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub block_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct AnchorListResponse {
    anchors: Vec<RawAnchor>,
    pagination: Pagination,
}

#[derive(Deserialize)]
struct AnchorResponse {
    anchor: RawAnchor,
}

#[derive(Deserialize)]
struct ProofResponse {
    proof: InclusionProof,
}

/// Client for the remote audit service.
#[derive(Debug, Clone)]
pub struct AuditClient {
    base_url: Url,
    http_client: Client,
}

impl AuditClient {
    /// Create a client for `base_url`; `timeout` bounds every request.
    ///
    /// No connection is opened until the first request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AnchorError::Config(format!("Invalid API URL {}: {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(AnchorError::Config(format!(
                "API URL cannot be used as a base: {}",
                base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("audit-anchor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnchorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.api_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch one page of anchors, in the order the service returns them.
    pub async fn list_anchors(&self, filter: &AnchorFilter, page: u32) -> Result<AnchorPage> {
        let url = self.endpoint(&["anchors"])?;
        debug!("Listing anchors page {} with {:?}", page, filter);

        let response: AnchorListResponse = self.get_json(url, &filter.query_pairs(page)).await?;
        let anchors = response
            .anchors
            .into_iter()
            .map(AnchorRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(AnchorPage {
            anchors,
            pagination: response.pagination,
        })
    }

    /// Walk every page of the listing, one request at a time.
    pub async fn list_all_anchors(&self, filter: &AnchorFilter) -> Result<Vec<AnchorRecord>> {
        let mut anchors = Vec::new();
        let mut page = 1;

        loop {
            let current = self.list_anchors(filter, page).await?;
            if current.pagination.page != page {
                return Err(AnchorError::RemoteResponse {
                    endpoint: self.endpoint(&["anchors"])?.to_string(),
                    reason: format!(
                        "requested page {} but the service returned page {}",
                        page, current.pagination.page
                    ),
                });
            }

            let exhausted = current.anchors.is_empty() || page >= current.pagination.total_pages;
            anchors.extend(current.anchors);
            if exhausted {
                break;
            }
            page += 1;
        }

        info!("Fetched {} anchors across {} pages", anchors.len(), page);
        Ok(anchors)
    }

    pub async fn get_anchor(&self, id: &str) -> Result<AnchorRecord> {
        let url = self.endpoint(&["anchors", id])?;
        let response: AnchorResponse = self.get_json(url, &[]).await?;
        AnchorRecord::try_from(response.anchor)
    }

    /// Poll an anchor until it reaches a terminal status.
    ///
    /// Each poll is checked against the previous one; a status that moves
    /// backwards or out of a terminal state aborts the watch.
    pub async fn watch_anchor(&self, id: &str, period: Duration) -> Result<AnchorRecord> {
        if period.is_zero() {
            return Err(AnchorError::Config(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        let mut tracker = AnchorTracker::new();
        let mut ticker = tokio::time::interval(period);

        loop {
            ticker.tick().await;
            let anchor = self.get_anchor(id).await?;
            tracker.observe(&anchor)?;

            if anchor.status.is_terminal() {
                return Ok(anchor);
            }
            debug!("{}, polling again in {:?}", anchor.summary(), period);
        }
    }

    /// Fetch the inclusion proof for a record.
    pub async fn fetch_proof(&self, record_id: &str, kind: RecordKind) -> Result<InclusionProof> {
        let url = self.endpoint(&["proof", record_id])?;
        let response: ProofResponse = self
            .get_json(url, &[("record_type", kind.as_str().to_string())])
            .await?;
        Ok(response.proof)
    }

    /// Fetch the proof document for a record without interpreting it.
    pub async fn fetch_proof_document(&self, record_id: &str, kind: RecordKind) -> Result<Vec<u8>> {
        let url = self.endpoint(&["proof", record_id])?;
        self.get_bytes(url, &[("record_type", kind.as_str().to_string())])
            .await
    }

    /// Ask the service to verify a proof, including its on-chain anchor.
    pub async fn verify_proof(&self, proof: &InclusionProof) -> Result<RemoteVerification> {
        let url = self.endpoint(&["verify"])?;
        let endpoint = url.path().to_string();
        info!("Submitting proof for remote verification to {}", endpoint);

        let response = self
            .http_client
            .post(url)
            .json(proof)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        // An invalid proof may be reported with 422 and a regular body.
        if status.is_success() || status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Ok(verification) = serde_json::from_slice::<RemoteVerification>(&body) {
                return Ok(verification);
            }
        }

        if !status.is_success() {
            return Err(rejected(&endpoint, status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| AnchorError::RemoteResponse {
            endpoint,
            reason: e.to_string(),
        })
    }

    /// Request a rendered compliance report. The body is returned untouched.
    pub async fn fetch_report(&self, request: &ExportRequest) -> Result<Vec<u8>> {
        let url = self.endpoint(&["reports", request.kind.as_str()])?;
        self.get_bytes(url, &request.query_pairs()).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnchorError::Config(format!("Invalid API URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let endpoint = url.path().to_string();
        debug!("GET {}", endpoint);

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        if !status.is_success() {
            return Err(rejected(&endpoint, status, &body));
        }

        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let endpoint = url.path().to_string();
        let body = self.get_bytes(url, query).await?;

        serde_json::from_slice(&body).map_err(|e| AnchorError::RemoteResponse {
            endpoint,
            reason: e.to_string(),
        })
    }
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> AnchorError {
    AnchorError::RemoteUnavailable {
        endpoint: endpoint.to_string(),
        timed_out: err.is_timeout(),
        reason: err.to_string(),
    }
}

fn rejected(endpoint: &str, status: StatusCode, body: &[u8]) -> AnchorError {
    let body: String = String::from_utf8_lossy(body).chars().take(512).collect();

    AnchorError::RemoteRejected {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    }
}

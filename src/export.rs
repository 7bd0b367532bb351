//! Compliance Report Export
//!
//! Reports are rendered by the audit service. This side only names the
//! report and date range, then writes whatever bytes come back to disk.

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::client::AuditClient;
use crate::error::Result;

/// Reports the audit service knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    AuditTrail,
    EuAiAct,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::AuditTrail => "audit-trail",
            ReportKind::EuAiAct => "eu-ai-act",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "audit-trail" => Ok(ReportKind::AuditTrail),
            "eu-ai-act" => Ok(ReportKind::EuAiAct),
            _ => Err(format!(
                "Invalid report kind: {} (expected audit-trail or eu-ai-act)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub kind: ReportKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ExportRequest {
    pub fn new(kind: ReportKind, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            kind,
            start_date,
            end_date,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start_date", self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }

    /// File name used when the caller does not pick one.
    pub fn default_file_name(&self) -> String {
        format!(
            "{}-report-{}-to-{}.pdf",
            self.kind,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

/// Write a document to `path` exactly as received.
pub async fn persist_document(path: &Path, document: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(path, document).await?;
    info!("Wrote {} bytes to {}", document.len(), path.display());
    Ok(())
}

/// Fetch a report and persist it, returning the path written.
///
/// Without `output` the report lands in `export_dir` under
/// [`ExportRequest::default_file_name`].
pub async fn export_report(
    client: &AuditClient,
    request: &ExportRequest,
    output: Option<&Path>,
    export_dir: &Path,
) -> Result<PathBuf> {
    info!(
        "Exporting {} report for {} to {}",
        request.kind, request.start_date, request.end_date
    );

    let document = client.fetch_report(request).await?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| export_dir.join(request.default_file_name()));

    persist_document(&path, &document).await?;
    Ok(path)
}

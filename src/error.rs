use thiserror::Error;

use crate::audit::anchor::AnchorStatus;

impl From<config::ConfigError> for AnchorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(format!("Configuration error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Malformed hash in {field}: {reason}")]
    MalformedHash { field: String, reason: String },

    #[error("Malformed proof input: {0}")]
    MalformedProofInput(String),

    #[error("Cannot read proof file {path}: {source}")]
    ProofInputUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown anchor status: {0:?}")]
    UnknownStatus(String),

    #[error("Anchor {id} is inconsistent: {reason}")]
    InconsistentAnchor { id: String, reason: String },

    #[error("Anchor {id} moved from {from} to {to}, which is not a valid transition")]
    IllegalTransition {
        id: String,
        from: AnchorStatus,
        to: AnchorStatus,
    },

    #[error("Audit service unavailable at {endpoint}{}: {reason}", timeout_suffix(.timed_out))]
    RemoteUnavailable {
        endpoint: String,
        timed_out: bool,
        reason: String,
    },

    #[error("Audit service rejected {endpoint} with HTTP {status}: {body}")]
    RemoteRejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {reason}")]
    RemoteResponse { endpoint: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnchorError {
    pub fn malformed_hash(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedHash {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn inconsistent_anchor(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InconsistentAnchor {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures where the service could not be asked at all, as
    /// opposed to answering with something we could evaluate.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}

fn timeout_suffix(timed_out: &bool) -> &'static str {
    if *timed_out {
        " (timed out)"
    } else {
        ""
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;

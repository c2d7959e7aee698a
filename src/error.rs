// Error taxonomy shared by the executor, the aggregator and the action dispatcher

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed probe, command or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Endpoint could not be reached (connect failure, ssh exit 255).
    Unreachable,
    /// Operation exceeded its bound.
    Timeout,
    /// Credential rejected by the remote side.
    AuthFailure,
    /// Command ran but returned a nonzero status or unusable output.
    ExecutionFailure,
    /// Caller asked for something that cannot be done (unknown service, missing target).
    InvalidRequest,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::AuthFailure => "auth failure",
            ErrorKind::ExecutionFailure => "execution failure",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Returned by the action dispatcher. Never retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ActionError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, detail)
    }
}

/// Why a single metric reading is unavailable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },
    #[error("{source_name} returned unparsable value {value:?}")]
    Parse {
        source_name: &'static str,
        value: String,
    },
    #[error("metric read fault: {0}")]
    Fault(String),
}

impl ReadError {
    pub fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        ReadError::Unavailable {
            source_name,
            reason: reason.into(),
        }
    }
}

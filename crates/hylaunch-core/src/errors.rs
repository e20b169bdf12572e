//! Error types for the acquisition and patching pipeline
//!
//! Failures are grouped by what the caller can do about them: a transfer can be
//! retried, an integrity failure needs a fresh download, while traversal,
//! platform and missing-artifact errors require manual action. Provisioners wrap
//! low-level errors with [`PipelineError::Context`] so the coordinator can report
//! where a failure happened without losing its kind.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// How a transfer failed, which decides whether retrying makes sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailure {
    /// The remote host could not be reached at all; retrying blindly will not help
    ConnectionLost,
    /// Timeouts, interrupted bodies and server-side errors
    Transient,
    /// The server answered and refused the request
    Rejected,
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailure::ConnectionLost => write!(f, "connection lost"),
            TransferFailure::Transient => write!(f, "transient"),
            TransferFailure::Rejected => write!(f, "rejected"),
        }
    }
}

/// A failed HTTP transfer
#[derive(Error, Debug, Clone)]
#[error("Transfer of {url} failed ({kind}): {message}")]
pub struct TransferError {
    pub url: String,
    pub kind: TransferFailure,
    pub status: Option<u16>,
    pub message: String,
}

impl TransferError {
    pub fn new(url: impl Into<String>, kind: TransferFailure, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a reqwest failure for the given URL
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(url, status);
        }

        let kind = if err.is_connect() {
            TransferFailure::ConnectionLost
        } else {
            TransferFailure::Transient
        };

        Self::new(url, kind, err.to_string())
    }

    /// Classify a non-success HTTP status
    pub fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        let retryable = status.is_server_error()
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
        let kind = if retryable {
            TransferFailure::Transient
        } else {
            TransferFailure::Rejected
        };

        Self {
            url: url.to_string(),
            kind,
            status: Some(status.as_u16()),
            message: format!("HTTP {}", status),
        }
    }

    /// Whether an automatic retry is plausible
    pub fn can_retry(&self) -> bool {
        self.kind == TransferFailure::Transient
    }

    pub fn is_connection_lost(&self) -> bool {
        self.kind == TransferFailure::ConnectionLost
    }
}

#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Integrity check failed for {path}: expected {expected} but got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Archive entry '{entry}' escapes destination {destination}")]
    PathTraversal { entry: String, destination: PathBuf },

    #[error("Platform not supported: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: PathBuf },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap this error with a description of what was being attempted
    pub fn context(self, context: impl Into<String>) -> Self {
        PipelineError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self.root_cause() {
            PipelineError::Transfer(err) => Some(err),
            _ => None,
        }
    }

    /// True when the failure is a transfer the caller may offer to retry manually
    pub fn can_retry(&self) -> bool {
        self.as_transfer().map(TransferError::can_retry).unwrap_or(false)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        PipelineError::Transfer(TransferError::from_reqwest(&url, &err))
    }
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => PipelineError::Io(io.to_string()),
            other => PipelineError::Archive(other.to_string()),
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = TransferError::from_status("http://x/a", reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.can_retry());
        assert_eq!(err.status, Some(503));

        let err = TransferError::from_status("http://x/a", reqwest::StatusCode::NOT_FOUND);
        assert!(!err.can_retry());
        assert_eq!(err.kind, TransferFailure::Rejected);

        let err = TransferError::from_status("http://x/a", reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(err.can_retry());
    }

    #[test]
    fn test_context_keeps_root_cause() {
        let err = PipelineError::from(TransferError::new(
            "http://x/jre.tar.gz",
            TransferFailure::Transient,
            "timed out",
        ))
        .context("Runtime download failed")
        .context("Provisioning runtime");

        assert!(err.can_retry());
        assert!(matches!(err.root_cause(), PipelineError::Transfer(_)));
        assert!(err.to_string().starts_with("Provisioning runtime: Runtime download failed"));
    }

    #[test]
    fn test_connection_lost_is_not_retryable() {
        let err = TransferError::new("http://x", TransferFailure::ConnectionLost, "refused");
        assert!(err.is_connection_lost());
        assert!(!PipelineError::from(err).can_retry());
    }
}

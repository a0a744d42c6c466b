//! Error types for the forensics client
//!
//! Every failure that can come back from the analysis service, or from
//! handling its output locally, is an [`Error`]. Sessions never propagate
//! these past their own boundary: they land in a `Failed` state and a
//! user-visible notice instead.

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Network unreachable, timeout, connection reset
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// Backend answered with a non-success status
    #[error("{endpoint} returned HTTP {code}: {detail}")]
    Status {
        endpoint: String,
        code: u16,
        detail: String,
    },

    /// Body did not have the expected report shape
    #[error("malformed report: {0}")]
    Malformed(String),

    /// Capture rejected before upload
    #[error("invalid capture file: {0}")]
    InvalidCapture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportFailure,
    MalformedResponse,
    Local,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } | Error::Status { .. } => ErrorKind::TransportFailure,
            Error::Malformed(_) => ErrorKind::MalformedResponse,
            Error::InvalidCapture(_) | Error::Io(_) => ErrorKind::Local,
        }
    }

    pub(crate) fn transport(endpoint: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            "could not connect".to_string()
        } else {
            err.to_string()
        };
        Error::Transport {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_transport_share_kind() {
        let status = Error::Status {
            endpoint: "/analyze".into(),
            code: 500,
            detail: "Analysis failed".into(),
        };
        let transport = Error::Transport {
            endpoint: "/analyze".into(),
            message: "could not connect".into(),
        };
        assert_eq!(status.kind(), ErrorKind::TransportFailure);
        assert_eq!(transport.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_json_errors_become_malformed() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_status_message_includes_detail() {
        let err = Error::Status {
            endpoint: "/generate_report".into(),
            code: 400,
            detail: "Invalid file type".into(),
        };
        assert_eq!(
            err.to_string(),
            "/generate_report returned HTTP 400: Invalid file type"
        );
    }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Backend { status: u16, detail: String },
    #[error("unexpected response body from backend: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read upload '{}': {source}", .path.display())]
    UploadRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ClientError {
    /// Backend answered with an error status and a readable detail.
    pub fn backend_detail(&self) -> Option<&str> {
        match self {
            Self::Backend { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// A failed backend call as shown to the user. Non-fatal for the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFailure {
    #[error("{0}")]
    Initialization(String),
    #[error("{0}")]
    Request(String),
}

impl SessionFailure {
    pub fn message(&self) -> &str {
        match self {
            Self::Initialization(message) | Self::Request(message) => message,
        }
    }
}

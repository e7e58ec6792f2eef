//! Error types for EHRbase operations

use reqwest::StatusCode;
use thiserror::Error;

/// Failures raised by the EHRbase clients
#[derive(Debug, Error)]
pub enum EhrbaseError {
    /// Caller input was rejected before any request was issued
    #[error("{0}")]
    InvalidInput(String),

    /// EHR status update without a version identifier
    #[error("Version UID is required for updating EHR status")]
    MissingVersion,

    /// EHRbase answered with a 4xx/5xx status
    #[error("EHRbase returned {status} for {url}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// The request never produced a response (connection refused, DNS, ...)
    #[error("request to EHRbase failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EhrbaseError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Numeric HTTP status of a remote failure, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, EhrbaseError>;

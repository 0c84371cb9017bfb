//! Fetch error definitions.

use thiserror::Error;

/// Errors raised by the fetch helper.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built or sent, or the body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Fetch Config Error {status}")]
    Status { status: u16 },

    /// The body is not valid JSON for the requested type.
    #[error("invalid config body: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Status code carried by a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status } => Some(*status),
            FetchError::Request(e) => e.status().map(|s| s.as_u16()),
            FetchError::Parse(_) => None,
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

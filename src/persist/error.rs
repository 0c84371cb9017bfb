//! Persistence error definitions.

use thiserror::Error;

/// Errors raised by storage media and persisters.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Reasons a stored snapshot was not restored.
///
/// Always recovered by discarding the snapshot.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("snapshot unreadable: {0}")]
    Storage(#[from] PersistError),

    #[error("snapshot buster {found:?} does not match {expected:?}")]
    BusterMismatch { expected: String, found: String },

    #[error("snapshot is {age_ms} ms old, limit is {max_age_ms} ms")]
    Expired { age_ms: u64, max_age_ms: u64 },
}

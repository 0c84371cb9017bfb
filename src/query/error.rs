//! Query error definitions.

use std::sync::Arc;

use thiserror::Error;

use crate::fetch::FetchError;

/// Boxed error returned by updater functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced through query state.
///
/// Cheap to clone so every observer can hold the same failure.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The registered updater failed.
    #[error("config updater failed: {0}")]
    Updater(Arc<dyn std::error::Error + Send + Sync>),

    /// The entry exists but has no fetch function.
    #[error("no fetch function registered for query {0}")]
    MissingFetcher(String),

    /// No entry exists under the key.
    #[error("query {0} is not registered")]
    NotFound(String),

    /// The entry was dropped while a caller waited on it.
    #[error("query {0} was removed while fetching")]
    Removed(String),

    /// Fetching needs a Tokio runtime and none is running.
    #[error("no async runtime available to run the fetch")]
    NoRuntime,
}

impl QueryError {
    pub fn updater(err: BoxError) -> Self {
        Self::Updater(Arc::from(err))
    }

    /// The fetch helper error behind an updater failure, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Updater(e) => e.downcast_ref::<FetchError>(),
            _ => None,
        }
    }

    /// HTTP status of a transport failure.
    pub fn status(&self) -> Option<u16> {
        self.fetch_error().and_then(FetchError::status)
    }
}

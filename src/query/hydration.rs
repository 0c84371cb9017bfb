//! Serializable form of cache entries.
//!
//! Field names follow the snapshot layout consumed by persisters:
//! `{ state: { data, status, fetchStatus, ... }, queryKey, queryHash }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::key::QueryKey;
use crate::query::state::{FetchStatus, QueryState, QueryStatus};

/// Entry state as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedState<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub data_update_count: u64,
    #[serde(default)]
    pub data_updated_at: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_update_count: u64,
    #[serde(default)]
    pub error_updated_at: u64,
    #[serde(default)]
    pub fetch_failure_count: u32,
    #[serde(default)]
    pub fetch_failure_reason: Option<String>,
    #[serde(default)]
    pub fetch_meta: Option<Value>,
    #[serde(default)]
    pub is_invalidated: bool,
    pub status: QueryStatus,
    #[serde(default)]
    pub fetch_status: FetchStatus,
}

impl<T: Clone> DehydratedState<T> {
    pub fn from_state(state: &QueryState<T>) -> Self {
        Self {
            data: state.data.clone(),
            data_update_count: state.data_update_count,
            data_updated_at: state.data_updated_at,
            error: state.error.as_ref().map(ToString::to_string),
            error_update_count: state.error_update_count,
            error_updated_at: state.error_updated_at,
            fetch_failure_count: state.fetch_failure_count,
            fetch_failure_reason: state.fetch_failure_reason.as_ref().map(ToString::to_string),
            fetch_meta: None,
            is_invalidated: state.is_invalidated,
            status: state.status,
            fetch_status: FetchStatus::Idle,
        }
    }
}

impl<T> DehydratedState<T> {
    /// Live state rebuilt from storage; errors are not carried over.
    pub fn into_state(self) -> QueryState<T> {
        QueryState {
            data: self.data,
            data_update_count: self.data_update_count,
            data_updated_at: self.data_updated_at,
            error: None,
            error_update_count: self.error_update_count,
            error_updated_at: self.error_updated_at,
            fetch_failure_count: 0,
            fetch_failure_reason: None,
            is_invalidated: self.is_invalidated,
            status: self.status,
            fetch_status: FetchStatus::Idle,
        }
    }
}

/// One dehydrated cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery<T> {
    pub state: DehydratedState<T>,
    pub query_key: QueryKey,
    pub query_hash: String,
}

impl<T> DehydratedQuery<T> {
    /// Only successful entries with data are worth restoring.
    pub fn is_restorable(&self) -> bool {
        self.state.status == QueryStatus::Success && self.state.data.is_some()
    }
}

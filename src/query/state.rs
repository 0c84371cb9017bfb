//! Query state machine.
//!
//! # States
//! - Pending: no data yet
//! - Success: latest data held
//! - Error: last fetch failed; earlier data, if any, is still exposed
//!
//! # State Transitions
//! ```text
//! Pending → Success: updater resolves
//! Pending → Error: updater fails after retries
//! Success ⇄ Error: later fetches succeed or fail
//! ```
//!
//! `fetch_status` runs alongside: `Fetching` while an updater call is in
//! flight, `Idle` otherwise.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::query::error::QueryError;

/// Data status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Whether an updater call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Fetching,
    Paused,
    #[default]
    Idle,
}

/// Full state of one cache entry.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub data_update_count: u64,
    /// Milliseconds since the Unix epoch; 0 when never set.
    pub data_updated_at: u64,
    pub error: Option<QueryError>,
    pub error_update_count: u64,
    pub error_updated_at: u64,
    pub fetch_failure_count: u32,
    pub fetch_failure_reason: Option<QueryError>,
    pub is_invalidated: bool,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
}

impl<T> QueryState<T> {
    /// Initial state, seeded with `initial` when present.
    pub fn new(initial: Option<T>, now: u64) -> Self {
        let (status, data_updated_at) = match initial {
            Some(_) => (QueryStatus::Success, now),
            None => (QueryStatus::Pending, 0),
        };
        Self {
            data: initial,
            data_update_count: 0,
            data_updated_at,
            error: None,
            error_update_count: 0,
            error_updated_at: 0,
            fetch_failure_count: 0,
            fetch_failure_reason: None,
            is_invalidated: false,
            status,
            fetch_status: FetchStatus::Idle,
        }
    }

    /// Whether the data is older than `stale_time` (`None` never goes stale).
    pub fn is_stale(&self, stale_time: Option<Duration>, now: u64) -> bool {
        if self.is_invalidated || self.data.is_none() {
            return true;
        }
        match stale_time {
            Some(stale_time) => {
                let stale_ms = u64::try_from(stale_time.as_millis()).unwrap_or(u64::MAX);
                now.saturating_sub(self.data_updated_at) >= stale_ms
            }
            None => false,
        }
    }

    pub(crate) fn begin_fetch(&mut self) {
        self.fetch_status = FetchStatus::Fetching;
        self.fetch_failure_count = 0;
        self.fetch_failure_reason = None;
        if self.data.is_none() {
            self.error = None;
            self.status = QueryStatus::Pending;
        }
    }

    pub(crate) fn succeed(&mut self, data: T, now: u64) {
        self.data = Some(data);
        self.data_update_count += 1;
        self.data_updated_at = now;
        self.error = None;
        self.fetch_failure_count = 0;
        self.fetch_failure_reason = None;
        self.is_invalidated = false;
        self.status = QueryStatus::Success;
        self.fetch_status = FetchStatus::Idle;
    }

    pub(crate) fn fail(&mut self, error: QueryError, failures: u32, now: u64) {
        self.error = Some(error.clone());
        self.error_update_count += 1;
        self.error_updated_at = now;
        self.fetch_failure_count = failures;
        self.fetch_failure_reason = Some(error);
        self.status = QueryStatus::Error;
        self.fetch_status = FetchStatus::Idle;
    }
}

/// Update counters captured when an observer mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountBaseline {
    pub data_update_count: u64,
    pub error_update_count: u64,
}

impl MountBaseline {
    pub fn of<T>(state: &QueryState<T>) -> Self {
        Self {
            data_update_count: state.data_update_count,
            error_update_count: state.error_update_count,
        }
    }
}

/// Snapshot of an entry as seen by one observer.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub error: Option<QueryError>,
    pub is_pending: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub is_fetching: bool,
    pub is_paused: bool,
    /// First load: pending and fetching.
    pub is_loading: bool,
    /// Background fetch with data already present.
    pub is_refetching: bool,
    pub is_stale: bool,
    pub is_fetched: bool,
    pub is_fetched_after_mount: bool,
    pub data_updated_at: u64,
    pub error_updated_at: u64,
    pub failure_count: u32,
    pub failure_reason: Option<QueryError>,
}

impl<T: Clone> QueryResult<T> {
    pub fn from_state(
        state: &QueryState<T>,
        baseline: MountBaseline,
        stale_time: Option<Duration>,
        now: u64,
    ) -> Self {
        let is_pending = state.status == QueryStatus::Pending;
        let is_fetching = state.fetch_status == FetchStatus::Fetching;
        Self {
            data: state.data.clone(),
            status: state.status,
            fetch_status: state.fetch_status,
            error: state.error.clone(),
            is_pending,
            is_success: state.status == QueryStatus::Success,
            is_error: state.status == QueryStatus::Error,
            is_fetching,
            is_paused: state.fetch_status == FetchStatus::Paused,
            is_loading: is_pending && is_fetching,
            is_refetching: is_fetching && !is_pending,
            is_stale: state.is_stale(stale_time, now),
            is_fetched: state.data_update_count > 0 || state.error_update_count > 0,
            is_fetched_after_mount: state.data_update_count > baseline.data_update_count
                || state.error_update_count > baseline.error_update_count,
            data_updated_at: state.data_updated_at,
            error_updated_at: state.error_updated_at,
            failure_count: state.fetch_failure_count,
            failure_reason: state.fetch_failure_reason.clone(),
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

//! Per-entry query options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::error::QueryError;
use crate::query::retry::backoff_delay;

/// When mounting an observer triggers a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchOnMount {
    /// Only when the entry has no data yet.
    #[default]
    Never,
    /// When the data is stale.
    IfStale,
    /// On every mount.
    Always,
}

/// How many times a failed fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    Never,
    Count(u32),
    Always,
}

impl Retry {
    /// Whether another attempt follows `failures` earlier failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        match self {
            Retry::Never => false,
            Retry::Count(max) => failures < *max,
            Retry::Always => true,
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Retry::Count(3)
    }
}

/// Custom delay function: `(failure_count, error) -> delay`.
pub type RetryDelayFn = Arc<dyn Fn(u32, &QueryError) -> Duration + Send + Sync>;

/// Delay before each retry.
#[derive(Clone)]
pub enum RetryDelay {
    /// `base * 2^(n-1)`, capped at `max`, with up to 10% jitter.
    Exponential { base: Duration, max: Duration },
    Fixed(Duration),
    Custom(RetryDelayFn),
}

impl RetryDelay {
    /// Delay before the retry that follows the `failure_count`th failure.
    pub fn delay(&self, failure_count: u32, error: &QueryError) -> Duration {
        match self {
            RetryDelay::Exponential { base, max } => backoff_delay(failure_count, *base, *max),
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Custom(f) => f(failure_count, error),
        }
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options applied to a cache entry.
///
/// `None` durations mean "never": never stale, never collected, no interval.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// How long a successful result stays fresh.
    pub stale_time: Option<Duration>,
    /// How long an entry with no observers is kept.
    pub gc_time: Option<Duration>,
    pub refetch_on_mount: RefetchOnMount,
    /// Refetch stale data when the host reports focus.
    pub refetch_on_window_focus: bool,
    /// Refetch stale data when the host reports connectivity.
    pub refetch_on_reconnect: bool,
    pub refetch_interval: Option<Duration>,
    pub retry: Retry,
    pub retry_delay: RetryDelay,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Some(Duration::from_secs(60 * 60 * 24)),
            gc_time: Some(Duration::from_secs(60 * 60 * 24 * 2)),
            refetch_on_mount: RefetchOnMount::Never,
            refetch_on_window_focus: true,
            refetch_on_reconnect: true,
            refetch_interval: None,
            retry: Retry::default(),
            retry_delay: RetryDelay::default(),
        }
    }
}

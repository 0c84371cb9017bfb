//! Options file schema.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::persist::{FileStorage, StoragePersister};
use crate::query::{QueryOptions, RefetchOnMount, Retry, RetryDelay};
use crate::setup::{PersisterChoice, SetupConfigOptions};

/// Root of the options file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OptionsFile {
    pub query: QueryOptionsFile,
    pub persist: PersistOptionsFile,
}

/// A duration in milliseconds, or the keyword `"never"`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MillisOrNever {
    Millis(u64),
    Keyword(String),
}

impl MillisOrNever {
    pub fn never() -> Self {
        Self::Keyword("never".to_string())
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Millis(_) => true,
            Self::Keyword(k) => k == "never",
        }
    }

    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
            Self::Keyword(_) => None,
        }
    }
}

/// `retry = 3`, `retry = true`, `retry = "never"` and so on.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RetrySetting {
    Count(u32),
    Flag(bool),
    Keyword(String),
}

impl RetrySetting {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Keyword(k) => k == "never" || k == "always",
            _ => true,
        }
    }

    pub fn to_retry(&self) -> Retry {
        match self {
            Self::Count(0) | Self::Flag(false) => Retry::Never,
            Self::Count(n) => Retry::Count(*n),
            Self::Flag(true) => Retry::Always,
            Self::Keyword(k) if k == "always" => Retry::Always,
            Self::Keyword(_) => Retry::Never,
        }
    }
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self::Count(3)
    }
}

/// Query options section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueryOptionsFile {
    pub stale_time_ms: MillisOrNever,
    pub gc_time_ms: MillisOrNever,
    pub refetch_on_mount: RefetchOnMount,
    pub refetch_on_window_focus: bool,
    pub refetch_on_reconnect: bool,
    pub refetch_interval_ms: Option<u64>,
    pub retry: RetrySetting,
    /// Fixed delay between retries; exponential backoff when unset.
    pub retry_delay_ms: Option<u64>,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for QueryOptionsFile {
    fn default() -> Self {
        Self {
            stale_time_ms: MillisOrNever::Millis(86_400_000),
            gc_time_ms: MillisOrNever::Millis(172_800_000),
            refetch_on_mount: RefetchOnMount::Never,
            refetch_on_window_focus: true,
            refetch_on_reconnect: true,
            refetch_interval_ms: None,
            retry: RetrySetting::default(),
            retry_delay_ms: None,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl QueryOptionsFile {
    pub fn to_query_options(&self) -> QueryOptions {
        let retry_delay = match self.retry_delay_ms {
            Some(ms) => RetryDelay::Fixed(Duration::from_millis(ms)),
            None => RetryDelay::Exponential {
                base: Duration::from_millis(self.retry_base_delay_ms),
                max: Duration::from_millis(self.retry_max_delay_ms),
            },
        };
        QueryOptions {
            stale_time: self.stale_time_ms.to_duration(),
            gc_time: self.gc_time_ms.to_duration(),
            refetch_on_mount: self.refetch_on_mount,
            refetch_on_window_focus: self.refetch_on_window_focus,
            refetch_on_reconnect: self.refetch_on_reconnect,
            refetch_interval: self.refetch_interval_ms.map(Duration::from_millis),
            retry: self.retry.to_retry(),
            retry_delay,
        }
    }
}

/// Persistence section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PersistOptionsFile {
    pub enabled: bool,
    pub buster: String,
    pub max_age_ms: Option<u64>,
    /// Store snapshots as files here instead of in process memory.
    pub directory: Option<PathBuf>,
}

impl Default for PersistOptionsFile {
    fn default() -> Self {
        Self {
            enabled: true,
            buster: String::new(),
            max_age_ms: None,
            directory: None,
        }
    }
}

impl OptionsFile {
    pub fn into_setup_options<T>(self) -> SetupConfigOptions<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let persister = match (self.persist.enabled, self.persist.directory) {
            (false, _) => PersisterChoice::Disabled,
            (true, Some(dir)) => {
                PersisterChoice::Custom(Arc::new(StoragePersister::new(FileStorage::new(dir))))
            }
            (true, None) => PersisterChoice::Default,
        };
        SetupConfigOptions {
            query_options: self.query.to_query_options(),
            buster: self.persist.buster,
            persister,
            max_age: self.persist.max_age_ms.map(Duration::from_millis),
        }
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::persist::{Persister, StoragePersister};
use crate::query::QueryOptions;

/// Which persister a setup writes snapshots through.
pub enum PersisterChoice<T> {
    /// JSON snapshots in the process-wide [`crate::persist::MemoryStorage::local`]
    /// under [`crate::persist::OFFLINE_CACHE_KEY`].
    ///
    /// Every store using this choice shares that one slot: a store whose
    /// config type cannot decode the stored snapshot discards it. Give such
    /// stores their own slot with [`SetupConfigOptions::with_storage_key`].
    Default,
    /// No persistence; nothing is restored or written.
    Disabled,
    Custom(Arc<dyn Persister<T>>),
}

impl<T> Default for PersisterChoice<T> {
    fn default() -> Self {
        Self::Default
    }
}

impl<T> Clone for PersisterChoice<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Disabled => Self::Disabled,
            Self::Custom(persister) => Self::Custom(Arc::clone(persister)),
        }
    }
}

impl<T> fmt::Debug for PersisterChoice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<T: Serialize + DeserializeOwned + 'static> PersisterChoice<T> {
    pub(crate) fn resolve(&self) -> Option<Arc<dyn Persister<T>>> {
        match self {
            Self::Default => Some(Arc::new(StoragePersister::local())),
            Self::Disabled => None,
            Self::Custom(persister) => Some(Arc::clone(persister)),
        }
    }
}

/// Options for [`crate::setup::setup_config`].
#[derive(Debug, Clone)]
pub struct SetupConfigOptions<T> {
    pub query_options: QueryOptions,
    /// Snapshots written under another buster are discarded on restore.
    pub buster: String,
    pub persister: PersisterChoice<T>,
    /// Oldest snapshot accepted on restore; `None` accepts any age.
    pub max_age: Option<Duration>,
}

impl<T> Default for SetupConfigOptions<T> {
    fn default() -> Self {
        Self {
            query_options: QueryOptions::default(),
            buster: String::new(),
            persister: PersisterChoice::Default,
            max_age: None,
        }
    }
}

impl<T> SetupConfigOptions<T> {
    pub fn with_buster(mut self, buster: impl Into<String>) -> Self {
        self.buster = buster.into();
        self
    }

    pub fn with_query_options(mut self, query_options: QueryOptions) -> Self {
        self.query_options = query_options;
        self
    }

    pub fn with_persister(mut self, persister: impl Persister<T> + 'static) -> Self {
        self.persister = PersisterChoice::Custom(Arc::new(persister));
        self
    }

    /// Persist in the process-wide memory medium under `key`.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        self.persister = PersisterChoice::Custom(Arc::new(StoragePersister::local().with_key(key)));
        self
    }

    pub fn without_persistence(mut self) -> Self {
        self.persister = PersisterChoice::Disabled;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

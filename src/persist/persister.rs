//! Persisters: encode snapshots onto a storage medium.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::persist::error::PersistError;
use crate::persist::snapshot::{PersistedClient, OFFLINE_CACHE_KEY};
use crate::persist::storage::{MemoryStorage, Storage};

/// Pluggable persistence adapter.
///
/// Restores are synchronous so they can complete before the first read.
pub trait Persister<T>: Send + Sync {
    fn persist_client(&self, client: &PersistedClient<T>) -> Result<(), PersistError>;
    fn restore_client(&self) -> Result<Option<PersistedClient<T>>, PersistError>;
    fn remove_client(&self) -> Result<(), PersistError>;
}

/// JSON persister over any [`Storage`], keyed by a single storage key.
#[derive(Clone)]
pub struct StoragePersister {
    storage: Arc<dyn Storage>,
    key: String,
}

impl StoragePersister {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
            key: OFFLINE_CACHE_KEY.to_string(),
        }
    }

    /// Persister over the process-wide [`MemoryStorage::local`] medium.
    pub fn local() -> Self {
        Self::new(MemoryStorage::local())
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T: Serialize + DeserializeOwned> Persister<T> for StoragePersister {
    fn persist_client(&self, client: &PersistedClient<T>) -> Result<(), PersistError> {
        let encoded = serde_json::to_string(client).map_err(PersistError::Encode)?;
        self.storage.set_item(&self.key, &encoded)
    }

    fn restore_client(&self) -> Result<Option<PersistedClient<T>>, PersistError> {
        match self.storage.get_item(&self.key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(PersistError::Decode),
            None => Ok(None),
        }
    }

    fn remove_client(&self) -> Result<(), PersistError> {
        self.storage.remove_item(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::storage::FileStorage;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let persister = StoragePersister::new(FileStorage::new(dir.path()));
        let snapshot: PersistedClient<u8> = PersistedClient::new("v1", 10, Vec::new());

        persister.persist_client(&snapshot).unwrap();
        let restored: Option<PersistedClient<u8>> = persister.restore_client().unwrap();
        assert_eq!(restored, Some(snapshot));

        Persister::<u8>::remove_client(&persister).unwrap();
        assert!(Persister::<u8>::restore_client(&persister).unwrap().is_none());
    }

    #[test]
    fn test_malformed_snapshot_is_decode_error() {
        let storage = MemoryStorage::new();
        storage.set_item(OFFLINE_CACHE_KEY, "{not json").unwrap();
        let persister = StoragePersister::new(storage);

        let err = Persister::<u8>::restore_client(&persister).unwrap_err();
        assert!(matches!(err, PersistError::Decode(_)));
    }

    #[test]
    fn test_custom_key() {
        let storage = MemoryStorage::new();
        let persister = StoragePersister::new(storage.clone()).with_key("app-config");
        let snapshot: PersistedClient<u8> = PersistedClient::new("", 0, Vec::new());
        persister.persist_client(&snapshot).unwrap();

        assert!(storage.get_item("app-config").unwrap().is_some());
        assert!(storage.get_item(OFFLINE_CACHE_KEY).unwrap().is_none());
    }
}

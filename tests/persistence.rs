//! Snapshots surviving across independent stores.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use remote_config::definition::ConfigDefinition;
use remote_config::persist::{
    FileStorage, MemoryStorage, PersistError, PersistedClient, Persister, Storage, StoragePersister,
    OFFLINE_CACHE_KEY,
};
use remote_config::query::{BoxError, QueryOptions, Retry};
use remote_config::setup::{setup_config, SetupConfigOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigExample {
    #[serde(rename = "API_URL")]
    api_url: String,
    num: u32,
}

const STORED: &str = r#"{"buster":"","timestamp":1715652068434,"clientState":{"mutations":[],"queries":[{"state":{"data":{"API_URL":"https://api.example.com","num":1},"dataUpdateCount":2,"dataUpdatedAt":1715652068434,"error":null,"errorUpdateCount":0,"errorUpdatedAt":0,"fetchFailureCount":0,"fetchFailureReason":null,"fetchMeta":null,"isInvalidated":false,"status":"success","fetchStatus":"idle"},"queryKey":["config"],"queryHash":"[\"config\"]"}]}}"#;

fn definition() -> ConfigDefinition<ConfigExample> {
    ConfigDefinition::new()
        .field("API_URL", "https://api.example.com")
        .field("num", 0)
}

fn options(storage: impl Storage + 'static, buster: &str) -> SetupConfigOptions<ConfigExample> {
    SetupConfigOptions::default()
        .with_buster(buster)
        .with_persister(StoragePersister::new(storage))
        .with_query_options(QueryOptions {
            retry: Retry::Never,
            ..QueryOptions::default()
        })
}

/// Storage-backed persister whose restore takes a while.
struct SlowRestore {
    inner: StoragePersister,
    delay: Duration,
}

impl SlowRestore {
    fn new(storage: MemoryStorage, delay: Duration) -> Self {
        Self {
            inner: StoragePersister::new(storage),
            delay,
        }
    }
}

impl Persister<ConfigExample> for SlowRestore {
    fn persist_client(&self, client: &PersistedClient<ConfigExample>) -> Result<(), PersistError> {
        Persister::<ConfigExample>::persist_client(&self.inner, client)
    }

    fn restore_client(&self) -> Result<Option<PersistedClient<ConfigExample>>, PersistError> {
        std::thread::sleep(self.delay);
        Persister::<ConfigExample>::restore_client(&self.inner)
    }

    fn remove_client(&self) -> Result<(), PersistError> {
        Persister::<ConfigExample>::remove_client(&self.inner)
    }
}

fn updater(num: u32) -> impl Fn() -> std::future::Ready<Result<ConfigExample, BoxError>> + Send + Sync + 'static {
    move || {
        std::future::ready(Ok(ConfigExample {
            api_url: "https://api.example.com".to_string(),
            num,
        }))
    }
}

async fn wait_for_snapshot(storage: &impl Storage) -> String {
    for _ in 0..100 {
        if let Some(raw) = storage.get_item(OFFLINE_CACHE_KEY).unwrap() {
            return raw;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("snapshot was never written");
}

/// Run one store: mount, refetch once, unmount.
async fn save(storage: impl Storage + Clone + 'static, buster: &str, num: u32) {
    let (provider, use_config, _client) =
        setup_config(definition(), updater(num), options(storage.clone(), buster)).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;
    let mut query = use_config.use_config(&scope);
    let result = query.refetch().await.unwrap();
    assert_eq!(result.config.num, num);

    let raw = wait_for_snapshot(&storage).await;
    assert!(raw.contains(&format!("\"num\":{}", num)));
}

#[tokio::test]
async fn test_restores_matching_buster() {
    let storage = MemoryStorage::new();
    save(storage.clone(), "save", 1).await;

    let (provider, use_config, _client) =
        setup_config(definition(), updater(2), options(storage.clone(), "save")).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;
    assert!(!scope.is_restoring());

    let query = use_config.use_config(&scope);
    let result = query.result();
    assert_eq!(result.config.num, 1);
    assert!(!result.is_restoring);
    assert!(!result.is_fetched_after_mount);
}

#[tokio::test]
async fn test_discards_other_buster() {
    let storage = MemoryStorage::new();
    save(storage.clone(), "save", 1).await;

    let (provider, use_config, _client) =
        setup_config(definition(), updater(2), options(storage.clone(), "load")).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;

    let query = use_config.use_config(&scope);
    assert_eq!(query.result().config.num, 0);
    assert!(storage.get_item(OFFLINE_CACHE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_restores_stored_document() {
    let storage = MemoryStorage::new();
    storage.set_item(OFFLINE_CACHE_KEY, STORED).unwrap();

    let (provider, use_config, _client) =
        setup_config(definition(), updater(2), options(storage, "")).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;

    let query = use_config.use_config(&scope);
    assert_eq!(query.result().config.num, 1);
}

#[tokio::test]
async fn test_malformed_snapshot_falls_back_to_seed() {
    let storage = MemoryStorage::new();
    storage.set_item(OFFLINE_CACHE_KEY, "{\"buster\":").unwrap();

    let (provider, use_config, _client) =
        setup_config(definition(), updater(2), options(storage.clone(), "")).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;

    let query = use_config.use_config(&scope);
    assert_eq!(query.result().config.num, 0);
    assert!(storage.get_item(OFFLINE_CACHE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_expired_snapshot_is_discarded() {
    let storage = MemoryStorage::new();
    storage.set_item(OFFLINE_CACHE_KEY, STORED).unwrap();

    let options = options(storage.clone(), "").with_max_age(Duration::from_secs(60));
    let (provider, use_config, _client) = setup_config(definition(), updater(2), options).unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;

    let query = use_config.use_config(&scope);
    assert_eq!(query.result().config.num, 0);
}

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    save(FileStorage::new(dir.path()), "v1", 7).await;

    let (provider, use_config, _client) = setup_config(
        definition(),
        updater(8),
        options(FileStorage::new(dir.path()), "v1"),
    )
    .unwrap();
    let scope = provider.mount().unwrap();
    scope.restored().await;

    let query = use_config.use_config(&scope);
    assert_eq!(query.result().config.num, 7);
}

#[tokio::test]
async fn test_disabled_persistence_writes_nothing() {
    let storage = MemoryStorage::new();
    let options = options(storage.clone(), "").without_persistence();
    let (provider, use_config, _client) = setup_config(definition(), updater(3), options).unwrap();
    let scope = provider.mount().unwrap();
    assert!(!scope.is_restoring());

    let mut query = use_config.use_config(&scope);
    query.refetch().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_fetch_during_restore_is_persisted() {
    let storage = MemoryStorage::new();
    let options = SetupConfigOptions::default()
        .with_persister(SlowRestore::new(storage.clone(), Duration::from_millis(300)));
    let (provider, use_config, _client) = setup_config(definition(), updater(4), options).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);
    let result = query.refetch().await.unwrap();
    assert_eq!(result.config.num, 4);
    assert!(result.is_restoring);

    scope.restored().await;
    let raw = wait_for_snapshot(&storage).await;
    assert!(raw.contains("\"num\":4"));
}

#[tokio::test]
async fn test_unmount_during_restore_clears_restoring() {
    let storage = MemoryStorage::new();
    storage.set_item(OFFLINE_CACHE_KEY, STORED).unwrap();
    let options = SetupConfigOptions::default()
        .with_persister(SlowRestore::new(storage, Duration::from_millis(500)));
    let (provider, use_config, _client) = setup_config(definition(), updater(2), options).unwrap();

    let scope = provider.mount().unwrap();
    let query = use_config.use_config(&scope);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(scope.is_restoring());

    scope.unmount();
    tokio::time::timeout(Duration::from_secs(2), scope.restored())
        .await
        .unwrap();
    assert!(!scope.is_restoring());
    assert!(!query.result().is_restoring);
}

//! Setup, provider and hook working together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use remote_config::definition::ConfigDefinition;
use remote_config::fetch::{json_updater, FetchOptions};
use remote_config::query::{BoxError, QueryKey, QueryOptions, RefetchOnMount, Retry};
use remote_config::setup::{setup_config, SetupConfigOptions};

mod common;
use common::TestConfig;

fn no_persistence() -> SetupConfigOptions<TestConfig> {
    SetupConfigOptions::default().without_persistence()
}

fn definition() -> ConfigDefinition<TestConfig> {
    ConfigDefinition::new().field("api_url", "default_url")
}

#[tokio::test]
async fn test_seed_immediately_then_refetched_value() {
    let addr = common::start_mock_backend(200, r#"{"api_url":"test_url"}"#).await;
    let updater = json_updater::<TestConfig>(common::url(addr), FetchOptions::default());
    let (provider, use_config, _client) = setup_config(definition(), updater, no_persistence()).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);

    let initial = query.result();
    assert_eq!(initial.config, TestConfig::new("default_url"));
    assert!(!initial.is_loading);
    assert!(!initial.is_fetched_after_mount);

    let refreshed = query.refetch().await.unwrap();
    assert_eq!(refreshed.config, TestConfig::new("test_url"));
    assert!(refreshed.is_fetched_after_mount);
    assert!(!refreshed.is_error);
}

#[tokio::test]
async fn test_mount_fetch_when_always() {
    let addr = common::start_mock_backend(200, r#"{"api_url":"mounted"}"#).await;
    let updater = json_updater::<TestConfig>(common::url(addr), FetchOptions::default());
    let options = no_persistence().with_query_options(QueryOptions {
        refetch_on_mount: RefetchOnMount::Always,
        ..QueryOptions::default()
    });
    let (provider, use_config, _client) = setup_config(definition(), updater, options).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        query.wait_for(|r| r.is_fetched_after_mount),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(result.config, TestConfig::new("mounted"));
}

#[tokio::test]
async fn test_failure_keeps_seed() {
    let addr = common::start_mock_backend(500, r#"{"message":"down"}"#).await;
    let updater = json_updater::<TestConfig>(common::url(addr), FetchOptions::debug());
    let options = no_persistence().with_query_options(QueryOptions {
        retry: Retry::Never,
        ..QueryOptions::default()
    });
    let (provider, use_config, _client) = setup_config(definition(), updater, options).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);
    let result = query.refetch().await.unwrap();

    assert!(result.is_error);
    assert_eq!(result.error.as_ref().and_then(|e| e.status()), Some(500));
    assert_eq!(result.config, TestConfig::new("default_url"));
}

#[tokio::test]
async fn test_refetch_supersedes_in_flight_fetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let updater = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n == 1 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok::<_, BoxError>(TestConfig::new(&format!("call-{}", n)))
        }
    };
    let options = no_persistence().with_query_options(QueryOptions {
        refetch_on_mount: RefetchOnMount::Always,
        ..QueryOptions::default()
    });
    let (provider, use_config, _client) = setup_config(definition(), updater, options).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(query.result().query.is_fetching);

    let result = query.refetch().await.unwrap();
    assert_eq!(result.config, TestConfig::new("call-2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unmount_is_idempotent_and_keeps_data() {
    let updater = || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, BoxError>(TestConfig::new("never"))
    };
    let options = no_persistence().with_query_options(QueryOptions {
        refetch_on_mount: RefetchOnMount::Always,
        ..QueryOptions::default()
    });
    let (provider, use_config, client) = setup_config(definition(), updater, options).unwrap();

    let scope = provider.mount().unwrap();
    let query = use_config.use_config(&scope);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(query.result().query.is_fetching);

    scope.unmount();
    scope.unmount();
    assert!(scope.is_unmounted());

    let result = query.result();
    assert!(!result.query.is_fetching);
    assert_eq!(result.config, TestConfig::new("default_url"));
    assert_eq!(
        client.get_query_data(&QueryKey::config()),
        Some(TestConfig::new("default_url"))
    );
}

#[tokio::test]
async fn test_remove_queries_falls_back_to_seed() {
    let addr = common::start_mock_backend(200, r#"{"api_url":"test_url"}"#).await;
    let updater = json_updater::<TestConfig>(common::url(addr), FetchOptions::default());
    let (provider, use_config, client) = setup_config(definition(), updater, no_persistence()).unwrap();

    let scope = provider.mount().unwrap();
    let mut query = use_config.use_config(&scope);
    query.refetch().await.unwrap();
    assert_eq!(query.result().config, TestConfig::new("test_url"));

    client.remove_queries();
    let result = query.result();
    assert_eq!(result.config, TestConfig::new("default_url"));
    assert!(!result.is_fetched_after_mount);
    let result = query.refetch().await.unwrap();
    assert_eq!(result.config, TestConfig::new("test_url"));

    client.clear();
    assert!(client.get_query_data(&QueryKey::config()).is_none());
    assert_eq!(query.result().config, TestConfig::new("default_url"));
    let result = query.refetch().await.unwrap();
    assert_eq!(result.config, TestConfig::new("test_url"));
    assert!(client.get_query_data(&QueryKey::config()).is_some());
}

#[tokio::test]
async fn test_mount_outside_runtime_fails() {
    let updater = || async { Ok::<_, BoxError>(TestConfig::new("x")) };
    let (provider, _use_config, _client) = setup_config(definition(), updater, no_persistence()).unwrap();

    let result = std::thread::spawn(move || provider.mount().map(|_| ())).join().unwrap();
    assert!(matches!(result, Err(remote_config::SetupError::NoRuntime)));
}

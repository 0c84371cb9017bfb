//! Config store setup: one call wires the seed, the updater, the cache and
//! persistence together.
//!
//! # Data Flow
//! ```text
//! setup_config(seed, updater, options)
//!     → seed resolved (definition merge or value passthrough)
//!     → QueryClient created, ["config"] registered with the seed
//!
//! ConfigProvider::mount()
//!     → is_restoring = true
//!     → restore snapshot (persist) → is_restoring = false
//!     → persist subscription + refetch interval run until unmount
//!
//! UseConfig::use_config(&scope)
//!     → QueryObserver on ["config"], mount fetch held back while restoring
//! ```

pub mod hook;
pub mod options;
pub mod provider;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::definition::{ConfigSeed, MergeError};
use crate::persist::Persister;
use crate::query::{fetcher, BoxError, QueryClient, QueryKey, Registration};

pub use hook::{ConfigQuery, ConfigResult, UseConfig};
pub use options::{PersisterChoice, SetupConfigOptions};
pub use provider::{ConfigProvider, MountedConfig};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid config seed: {0}")]
    Merge(#[from] MergeError),

    #[error("config provider must be mounted inside a Tokio runtime")]
    NoRuntime,
}

/// State shared by the provider, the hook and every mounted scope.
pub(crate) struct Setup<T> {
    pub(crate) client: QueryClient<T>,
    pub(crate) key: QueryKey,
    pub(crate) registration: Registration<T>,
    pub(crate) seed: T,
    pub(crate) persister: Option<Arc<dyn Persister<T>>>,
    pub(crate) buster: String,
    pub(crate) max_age: Option<Duration>,
}

impl<T: Clone + Send + Sync + 'static> Setup<T> {
    pub(crate) fn register(&self) {
        self.client.register(
            &self.key,
            Arc::clone(&self.registration.fetcher),
            self.registration.seed.clone(),
            self.registration.options.clone(),
        );
    }
}

/// The pieces returned by [`setup_config`].
pub type ConfigStore<T> = (ConfigProvider<T>, UseConfig<T>, QueryClient<T>);

/// Create an isolated config store.
///
/// The seed is served until the first `updater` call succeeds, and again
/// whenever nothing better is cached. Every call builds its own
/// [`QueryClient`]; stores never share state.
pub fn setup_config<T, S, F, Fut, E>(
    seed: S,
    updater: F,
    options: SetupConfigOptions<T>,
) -> Result<ConfigStore<T>, SetupError>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    S: Into<ConfigSeed<T>>,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    let seed = seed.into().resolve()?;
    let client = QueryClient::new();
    let persister = options.persister.resolve();

    let setup = Arc::new(Setup {
        client: client.clone(),
        key: QueryKey::config(),
        registration: Registration {
            fetcher: fetcher(updater),
            seed: Some(seed.clone()),
            options: options.query_options,
        },
        seed,
        persister,
        buster: options.buster,
        max_age: options.max_age,
    });
    setup.register();

    tracing::info!(
        client = %client.id(),
        persistence = setup.persister.is_some(),
        buster = %setup.buster,
        "Config store set up"
    );

    Ok((
        ConfigProvider::new(Arc::clone(&setup)),
        UseConfig::new(setup),
        client,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ConfigDefinition;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct AppConfig {
        api_url: String,
    }

    #[test]
    fn test_missing_default_fails_fast() {
        let definition: ConfigDefinition<AppConfig> = ConfigDefinition::new().optional("api_url");
        let result = setup_config(
            definition,
            || async { Ok::<_, BoxError>(AppConfig { api_url: "x".into() }) },
            SetupConfigOptions::default().without_persistence(),
        );
        assert!(matches!(
            result,
            Err(SetupError::Merge(MergeError::MissingRequiredDefault { .. }))
        ));
    }

    #[test]
    fn test_stores_are_isolated() {
        let seed = || ConfigSeed::value(AppConfig { api_url: "seed".into() });
        let updater = || async { Ok::<_, BoxError>(AppConfig { api_url: "x".into() }) };
        let (_, _, first) =
            setup_config(seed(), updater, SetupConfigOptions::default().without_persistence()).unwrap();
        let (_, _, second) =
            setup_config(seed(), updater, SetupConfigOptions::default().without_persistence()).unwrap();

        assert_ne!(first.id(), second.id());
        first.set_query_data(&QueryKey::config(), AppConfig { api_url: "changed".into() });
        assert_eq!(
            second.get_query_data(&QueryKey::config()),
            Some(AppConfig { api_url: "seed".into() })
        );
    }
}

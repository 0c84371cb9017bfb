use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use crate::query::{QueryError, QueryObserver, QueryResult};
use crate::setup::provider::MountedConfig;
use crate::setup::Setup;

/// Hook half of a config store.
pub struct UseConfig<T> {
    setup: Arc<Setup<T>>,
}

impl<T> Clone for UseConfig<T> {
    fn clone(&self) -> Self {
        Self {
            setup: Arc::clone(&self.setup),
        }
    }
}

impl<T> UseConfig<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(setup: Arc<Setup<T>>) -> Self {
        Self { setup }
    }

    /// Observe the config inside a mounted provider scope.
    ///
    /// Mounting the observer may start a fetch, per `refetch_on_mount`; it
    /// waits for a running restore to finish first.
    pub fn use_config(&self, scope: &MountedConfig<T>) -> ConfigQuery<T> {
        if !Arc::ptr_eq(&self.setup, &scope.setup) {
            tracing::warn!(
                client = %self.setup.client.id(),
                scope = %scope.client().id(),
                "use_config called with a scope from another store"
            );
        }
        let restoring = scope.restoring_gate();
        let observer = QueryObserver::new(
            self.setup.client.clone(),
            self.setup.key.clone(),
            self.setup.registration.clone(),
            Some(restoring.clone()),
        );
        ConfigQuery {
            observer,
            restoring,
            seed: self.setup.seed.clone(),
        }
    }
}

/// What a config consumer sees.
#[derive(Debug, Clone)]
pub struct ConfigResult<T> {
    /// Latest fetched or restored config, else the seed.
    pub config: T,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<QueryError>,
    pub is_fetched_after_mount: bool,
    pub is_restoring: bool,
    pub query: QueryResult<T>,
}

/// A live config observer returned by [`UseConfig::use_config`].
pub struct ConfigQuery<T: Clone + Send + Sync + 'static> {
    observer: QueryObserver<T>,
    restoring: watch::Receiver<bool>,
    seed: T,
}

impl<T: Clone + Send + Sync + 'static> ConfigQuery<T> {
    pub fn result(&self) -> ConfigResult<T> {
        self.wrap(self.observer.result())
    }

    fn wrap(&self, query: QueryResult<T>) -> ConfigResult<T> {
        ConfigResult {
            config: query.data.clone().unwrap_or_else(|| self.seed.clone()),
            is_loading: query.is_loading,
            is_error: query.is_error,
            error: query.error.clone(),
            is_fetched_after_mount: query.is_fetched_after_mount,
            is_restoring: *self.restoring.borrow(),
            query,
        }
    }

    /// Call the updater now, superseding a fetch in flight.
    pub async fn refetch(&mut self) -> Result<ConfigResult<T>, QueryError> {
        let query = self.observer.refetch().await?;
        Ok(self.wrap(query))
    }

    /// Wait for the next change to the config entry or to `is_restoring`.
    pub async fn changed(&mut self) -> Result<(), QueryError> {
        self.observer.sync();
        if !*self.restoring.borrow() {
            return self.observer.changed().await;
        }
        tokio::select! {
            changed = self.observer.changed() => changed,
            restored = self.restoring.changed() => {
                if restored.is_err() {
                    return self.observer.changed().await;
                }
                Ok(())
            }
        }
    }

    /// Wait until `predicate` holds.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ConfigResult<T>) -> bool,
    ) -> Result<ConfigResult<T>, QueryError> {
        loop {
            let result = self.result();
            if predicate(&result) {
                return Ok(result);
            }
            self.changed().await?;
        }
    }
}

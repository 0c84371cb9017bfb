use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::lifecycle::Teardown;
use crate::persist::{restore_or_discard, PersistSubscription};
use crate::query::entry::lock;
use crate::query::QueryClient;
use crate::setup::{Setup, SetupError};

/// Provider half of a config store. Mount it to start restoring, persisting
/// and interval refetching.
pub struct ConfigProvider<T> {
    setup: Arc<Setup<T>>,
}

impl<T> Clone for ConfigProvider<T> {
    fn clone(&self) -> Self {
        Self {
            setup: Arc::clone(&self.setup),
        }
    }
}

/// Resolves when either the scope or its client is torn down.
async fn stopped(scope: impl Future<Output = ()>, client: impl Future<Output = ()>) {
    tokio::select! {
        _ = scope => {}
        _ = client => {}
    }
}

impl<T> ConfigProvider<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(setup: Arc<Setup<T>>) -> Self {
        Self { setup }
    }

    pub fn client(&self) -> &QueryClient<T> {
        &self.setup.client
    }

    /// Mount the provider on the current Tokio runtime.
    ///
    /// Returns immediately with `is_restoring` set while a persisted
    /// snapshot is loaded in the background; see [`MountedConfig::restored`].
    pub fn mount(&self) -> Result<MountedConfig<T>, SetupError> {
        let runtime = Handle::try_current().map_err(|_| SetupError::NoRuntime)?;
        let setup = Arc::clone(&self.setup);
        setup.register();

        let teardown = Teardown::new();
        let mut tasks = Vec::new();
        let (restoring, _) = watch::channel(setup.persister.is_some());
        let restoring = Arc::new(restoring);

        if let Some(persister) = setup.persister.clone() {
            let stop = stopped(teardown.stopped(), setup.client.unmounted());
            let restoring = Arc::clone(&restoring);
            let setup = Arc::clone(&setup);
            // Baseline predates the restore: fetches landing mid-restore count as changes.
            let subscription =
                PersistSubscription::new(setup.client.clone(), Arc::clone(&persister), setup.buster.clone());
            let task = runtime.spawn(async move {
                let restore = {
                    let client = setup.client.clone();
                    let persister = Arc::clone(&persister);
                    let buster = setup.buster.clone();
                    let max_age = setup.max_age;
                    tokio::task::spawn_blocking(move || {
                        restore_or_discard(&client, persister.as_ref(), &buster, max_age)
                    })
                };
                let restored = restore.await.unwrap_or(0);
                restoring.send_replace(false);
                tracing::debug!(client = %setup.client.id(), restored, "Config provider restored");

                subscription.run(stop).await;
            });
            tasks.push(task.abort_handle());
        }

        if let Some(interval) = setup.registration.options.refetch_interval {
            let mut stop = Box::pin(stopped(teardown.stopped(), setup.client.unmounted()));
            let setup = Arc::clone(&setup);
            let task = runtime.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = &mut stop => break,
                        _ = ticker.tick() => {
                            let observed = setup
                                .client
                                .entry(&setup.key)
                                .is_some_and(|entry| entry.observer_count() > 0);
                            if !observed {
                                continue;
                            }
                            if let Err(e) = setup.client.fetch_query(&setup.key).await {
                                tracing::debug!(error = %e, "Interval refetch failed");
                            }
                        }
                    }
                }
                tracing::debug!("Refetch interval stopped");
            });
            tasks.push(task.abort_handle());
        }

        tracing::debug!(client = %self.setup.client.id(), "Config provider mounted");
        Ok(MountedConfig {
            setup: Arc::clone(&self.setup),
            restoring,
            teardown,
            tasks: Mutex::new(tasks),
        })
    }
}

/// A mounted provider scope. Dropping it unmounts.
pub struct MountedConfig<T: Clone + Send + Sync + 'static> {
    pub(crate) setup: Arc<Setup<T>>,
    restoring: Arc<watch::Sender<bool>>,
    teardown: Teardown,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl<T: Clone + Send + Sync + 'static> MountedConfig<T> {
    /// Whether the persisted snapshot is still being restored.
    pub fn is_restoring(&self) -> bool {
        *self.restoring.borrow()
    }

    pub(crate) fn restoring_gate(&self) -> watch::Receiver<bool> {
        self.restoring.subscribe()
    }

    /// Wait until restoring has finished.
    pub async fn restored(&self) {
        let mut gate = self.restoring.subscribe();
        let _ = gate.wait_for(|restoring| !*restoring).await;
    }

    pub fn client(&self) -> &QueryClient<T> {
        &self.setup.client
    }

    pub fn is_unmounted(&self) -> bool {
        self.teardown.is_triggered()
    }

    /// Stop this scope's background tasks and cancel the in-flight fetch.
    ///
    /// Cached data is kept. Calling it again is a no-op.
    pub fn unmount(&self) {
        if !self.teardown.trigger() {
            return;
        }
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in tasks {
            task.abort();
        }
        // An aborted restore never clears the flag itself.
        self.restoring.send_replace(false);
        self.setup.client.cancel_queries();
        tracing::debug!(client = %self.setup.client.id(), "Config provider unmounted");
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for MountedConfig<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}

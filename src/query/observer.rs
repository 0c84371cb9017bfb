//! Observers: the read side of a cache entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::query::client::QueryClient;
use crate::query::entry::{FetchMode, Fetcher, QueryEntry};
use crate::query::error::QueryError;
use crate::query::key::QueryKey;
use crate::query::options::{QueryOptions, RefetchOnMount};
use crate::query::state::{now_ms, MountBaseline, QueryResult, QueryState, QueryStatus};

/// What an observer re-registers when its entry has been removed.
pub struct Registration<T> {
    pub fetcher: Fetcher<T>,
    pub seed: Option<T>,
    pub options: QueryOptions,
}

impl<T: Clone> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            seed: self.seed.clone(),
            options: self.options.clone(),
        }
    }
}

#[derive(Default)]
struct Baseline {
    data: AtomicU64,
    error: AtomicU64,
}

impl Baseline {
    fn reset<T>(&self, state: &QueryState<T>) {
        self.data.store(state.data_update_count, Ordering::SeqCst);
        self.error.store(state.error_update_count, Ordering::SeqCst);
    }

    fn get(&self) -> MountBaseline {
        MountBaseline {
            data_update_count: self.data.load(Ordering::SeqCst),
            error_update_count: self.error.load(Ordering::SeqCst),
        }
    }
}

/// Whether mounting an observer on `state` should start a fetch.
pub fn should_fetch_on_mount<T>(options: &QueryOptions, state: &QueryState<T>, now: u64) -> bool {
    if state.data.is_none() {
        return state.status != QueryStatus::Error;
    }
    match options.refetch_on_mount {
        RefetchOnMount::Never => false,
        RefetchOnMount::IfStale => state.is_stale(options.stale_time, now),
        RefetchOnMount::Always => true,
    }
}

/// Subscription to one entry of a [`QueryClient`].
///
/// Holding an observer keeps the entry from being collected.
pub struct QueryObserver<T: Clone + Send + Sync + 'static> {
    client: QueryClient<T>,
    key: QueryKey,
    registration: Registration<T>,
    entry: Arc<QueryEntry<T>>,
    receiver: watch::Receiver<QueryState<T>>,
    baseline: Arc<Baseline>,
    mount_task: Option<AbortHandle>,
}

impl<T: Clone + Send + Sync + 'static> QueryObserver<T> {
    /// Attach to `key`, creating the entry from `registration` if needed.
    ///
    /// While `gate` reads `true` the mount fetch is held back; the mount
    /// baseline is taken once it flips to `false`.
    pub fn new(
        client: QueryClient<T>,
        key: QueryKey,
        registration: Registration<T>,
        gate: Option<watch::Receiver<bool>>,
    ) -> Self {
        let entry = client.ensure(
            &key,
            Arc::clone(&registration.fetcher),
            registration.seed.clone(),
            registration.options.clone(),
        );
        entry.add_observer();
        let receiver = entry.subscribe();
        let baseline = Arc::new(Baseline::default());
        baseline.reset(&*receiver.borrow());

        let mut observer = Self {
            client,
            key,
            registration,
            entry,
            receiver,
            baseline,
            mount_task: None,
        };
        observer.mount(gate);
        observer
    }

    fn mount(&mut self, gate: Option<watch::Receiver<bool>>) {
        let options = self.registration.options.clone();
        let gate = gate.filter(|g| *g.borrow());
        let Some(mut gate) = gate else {
            if should_fetch_on_mount(&options, &self.entry.state(), now_ms()) {
                if let Err(e) = self.entry.dispatch(FetchMode::Dedupe) {
                    tracing::warn!(query = %self.key, error = %e, "Mount fetch failed to start");
                }
            }
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(query = %self.key, "No runtime; mount fetch skipped");
            return;
        };
        let entry = Arc::clone(&self.entry);
        let baseline = Arc::clone(&self.baseline);
        let handle = runtime.spawn(async move {
            if gate.wait_for(|restoring| !*restoring).await.is_err() {
                return;
            }
            let state = entry.state();
            baseline.reset(&state);
            if should_fetch_on_mount(&options, &state, now_ms()) {
                if let Err(e) = entry.dispatch(FetchMode::Dedupe) {
                    tracing::warn!(query = %entry.hash(), error = %e, "Mount fetch failed to start");
                }
            }
        });
        self.mount_task = Some(handle.abort_handle());
    }

    /// Current result as seen by this observer.
    ///
    /// Once the entry is gone from the client, the result reflects what
    /// replaced it: a newer entry, or the bare seed.
    pub fn result(&self) -> QueryResult<T> {
        let stale_time = self.registration.options.stale_time;
        let now = now_ms();
        match self.client.entry(&self.key) {
            Some(current) if Arc::ptr_eq(&current, &self.entry) => {
                QueryResult::from_state(&*self.receiver.borrow(), self.baseline.get(), stale_time, now)
            }
            Some(current) => {
                QueryResult::from_state(&current.state(), MountBaseline::default(), stale_time, now)
            }
            None => {
                let seeded = QueryState::new(self.registration.seed.clone(), now);
                QueryResult::from_state(&seeded, MountBaseline::default(), stale_time, now)
            }
        }
    }

    /// Re-attach when the entry was removed or replaced in the client.
    pub fn sync(&mut self) {
        let current = self.client.entry(&self.key);
        if current.as_ref().is_some_and(|e| Arc::ptr_eq(e, &self.entry)) {
            return;
        }
        let entry = self.client.ensure(
            &self.key,
            Arc::clone(&self.registration.fetcher),
            self.registration.seed.clone(),
            self.registration.options.clone(),
        );
        entry.add_observer();
        let previous = std::mem::replace(&mut self.entry, entry);
        self.client.release_observer(&previous);
        self.receiver = self.entry.subscribe();
        self.baseline.reset(&*self.receiver.borrow());
        tracing::debug!(query = %self.key, "Observer re-attached to new entry");
    }

    /// Run the registered fetch now, superseding one in flight.
    pub async fn refetch(&mut self) -> Result<QueryResult<T>, QueryError> {
        self.sync();
        self.entry.dispatch(FetchMode::Supersede)?;
        self.entry.settled().await?;
        Ok(self.result())
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> Result<(), QueryError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| QueryError::Removed(self.key.query_hash()))
    }

    /// Wait until `predicate` holds for the current result.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&QueryResult<T>) -> bool,
    ) -> Result<QueryResult<T>, QueryError> {
        loop {
            let result = self.result();
            if predicate(&result) {
                return Ok(result);
            }
            self.sync();
            self.changed().await?;
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        if let Some(task) = self.mount_task.take() {
            task.abort();
        }
        self.client.release_observer(&self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::entry::fetcher;
    use crate::query::error::BoxError;
    use std::time::Duration;

    fn options(refetch_on_mount: RefetchOnMount) -> QueryOptions {
        QueryOptions {
            refetch_on_mount,
            ..QueryOptions::default()
        }
    }

    #[test]
    fn test_should_fetch_on_mount() {
        let fresh = QueryState::new(Some(1), now_ms());
        assert!(!should_fetch_on_mount(&options(RefetchOnMount::Never), &fresh, now_ms()));
        assert!(!should_fetch_on_mount(&options(RefetchOnMount::IfStale), &fresh, now_ms()));
        assert!(should_fetch_on_mount(&options(RefetchOnMount::Always), &fresh, now_ms()));

        let empty: QueryState<u8> = QueryState::new(None, 0);
        assert!(should_fetch_on_mount(&options(RefetchOnMount::Never), &empty, 0));
    }

    fn registration(value: u32) -> Registration<u32> {
        Registration {
            fetcher: fetcher(move || async move { Ok::<_, BoxError>(value) }),
            seed: Some(0),
            options: QueryOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_refetch_marks_fetched_after_mount() {
        let client = QueryClient::new();
        let mut observer = QueryObserver::new(client, QueryKey::config(), registration(5), None);

        let initial = observer.result();
        assert_eq!(initial.data, Some(0));
        assert!(!initial.is_fetched_after_mount);

        let refreshed = observer.refetch().await.unwrap();
        assert_eq!(refreshed.data, Some(5));
        assert!(refreshed.is_fetched_after_mount);
    }

    #[tokio::test]
    async fn test_reattaches_after_removal() {
        let client = QueryClient::new();
        let mut observer =
            QueryObserver::new(client.clone(), QueryKey::config(), registration(5), None);
        observer.refetch().await.unwrap();

        client.remove_queries();
        assert!(client.is_empty());

        observer.sync();
        assert_eq!(observer.result().data, Some(0));
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_cleared_entry_reads_as_seed() {
        let client = QueryClient::new();
        let mut observer =
            QueryObserver::new(client.clone(), QueryKey::config(), registration(5), None);
        observer.refetch().await.unwrap();
        assert_eq!(observer.result().data, Some(5));

        client.clear();
        let result = observer.result();
        assert_eq!(result.data, Some(0));
        assert!(!result.is_fetched_after_mount);
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_gate_defers_mount_fetch() {
        let client = QueryClient::new();
        let (gate_tx, gate_rx) = watch::channel(true);
        let reg = Registration {
            options: options(RefetchOnMount::Always),
            ..registration(3)
        };
        let mut observer = QueryObserver::new(client, QueryKey::config(), reg, Some(gate_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(observer.result().data, Some(0));

        gate_tx.send_replace(false);
        let done = observer.wait_for(|r| r.data == Some(3)).await.unwrap();
        assert!(done.is_fetched_after_mount);
    }
}

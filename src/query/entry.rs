//! A single cache entry and its fetch task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::observability::metrics;
use crate::query::error::{BoxError, QueryError};
use crate::query::key::QueryKey;
use crate::query::options::QueryOptions;
use crate::query::state::{now_ms, FetchStatus, QueryState};

/// Data-fetching routine registered for an entry.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Wrap an async function as a [`Fetcher`].
pub fn fetcher<T, F, Fut, E>(f: F) -> Fetcher<T>
where
    T: 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(move || -> BoxFuture<'static, Result<T, BoxError>> {
        let fut = f();
        Box::pin(async move { fut.await.map_err(Into::into) })
    })
}

/// How a new fetch treats one already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchMode {
    /// Join the running fetch.
    Dedupe,
    /// Abort the running fetch and start over.
    Supersede,
}

struct InFlight {
    id: u64,
    handle: AbortHandle,
}

pub(crate) fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct QueryEntry<T> {
    key: QueryKey,
    hash: String,
    state: watch::Sender<QueryState<T>>,
    cache_version: Arc<watch::Sender<u64>>,
    fetcher: Mutex<Option<Fetcher<T>>>,
    options: Mutex<QueryOptions>,
    in_flight: Mutex<Option<InFlight>>,
    next_fetch: AtomicU64,
    observers: AtomicUsize,
    gc: Mutex<Option<AbortHandle>>,
}

impl<T: Clone + Send + Sync + 'static> QueryEntry<T> {
    pub(crate) fn new(
        key: QueryKey,
        fetcher: Option<Fetcher<T>>,
        state: QueryState<T>,
        options: QueryOptions,
        cache_version: Arc<watch::Sender<u64>>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(state);
        Arc::new(Self {
            hash: key.query_hash(),
            key,
            state,
            cache_version,
            fetcher: Mutex::new(fetcher),
            options: Mutex::new(options),
            in_flight: Mutex::new(None),
            next_fetch: AtomicU64::new(0),
            observers: AtomicUsize::new(0),
            gc: Mutex::new(None),
        })
    }

    pub(crate) fn key(&self) -> &QueryKey {
        &self.key
    }

    pub(crate) fn hash(&self) -> &str {
        &self.hash
    }

    pub(crate) fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub(crate) fn options(&self) -> QueryOptions {
        lock(&self.options).clone()
    }

    pub(crate) fn configure(&self, fetcher: Fetcher<T>, options: QueryOptions) {
        *lock(&self.fetcher) = Some(fetcher);
        *lock(&self.options) = options;
    }

    /// Apply `f` to the state and notify cache watchers.
    pub(crate) fn update(&self, f: impl FnOnce(&mut QueryState<T>)) {
        self.state.send_modify(f);
        self.cache_version.send_modify(|v| *v = v.wrapping_add(1));
    }

    pub(crate) fn is_fetching(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Start a fetch unless `mode` says to join the running one.
    pub(crate) fn dispatch(self: &Arc<Self>, mode: FetchMode) -> Result<(), QueryError> {
        let runtime = Handle::try_current().map_err(|_| QueryError::NoRuntime)?;
        let fetcher = lock(&self.fetcher)
            .clone()
            .ok_or_else(|| QueryError::MissingFetcher(self.hash.clone()))?;
        let options = self.options();

        let mut in_flight = lock(&self.in_flight);
        if let Some(current) = in_flight.as_ref() {
            match mode {
                FetchMode::Dedupe => return Ok(()),
                FetchMode::Supersede => {
                    tracing::debug!(query = %self.hash, fetch = current.id, "Superseding in-flight fetch");
                    current.handle.abort();
                }
            }
        }

        let id = self.next_fetch.fetch_add(1, Ordering::Relaxed);
        self.update(QueryState::begin_fetch);
        let entry = Arc::clone(self);
        let handle = runtime.spawn(async move { entry.run_fetch(id, fetcher, options).await });
        *in_flight = Some(InFlight {
            id,
            handle: handle.abort_handle(),
        });
        Ok(())
    }

    async fn run_fetch(self: Arc<Self>, id: u64, fetcher: Fetcher<T>, options: QueryOptions) {
        let mut failures = 0u32;
        loop {
            let started = Instant::now();
            match fetcher().await {
                Ok(data) => {
                    metrics::record_fetch("success", started.elapsed());
                    if self.complete(id, |s| s.succeed(data, now_ms())) {
                        tracing::debug!(query = %self.hash, fetch = id, "Config fetch succeeded");
                    }
                    return;
                }
                Err(e) => {
                    metrics::record_fetch("error", started.elapsed());
                    let error = QueryError::updater(e);
                    if options.retry.should_retry(failures) {
                        failures += 1;
                        let delay = options.retry_delay.delay(failures, &error);
                        tracing::warn!(
                            query = %self.hash,
                            attempt = failures,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %error,
                            "Config fetch failed, retrying"
                        );
                        metrics::record_retry();
                        if self.is_current(id) {
                            self.update(|s| {
                                s.fetch_failure_count = failures;
                                s.fetch_failure_reason = Some(error.clone());
                            });
                        }
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    tracing::error!(query = %self.hash, error = %error, "Config fetch failed");
                    self.complete(id, |s| s.fail(error, failures + 1, now_ms()));
                    return;
                }
            }
        }
    }

    fn is_current(&self, id: u64) -> bool {
        lock(&self.in_flight).as_ref().map(|f| f.id) == Some(id)
    }

    /// Settle fetch `id`; results of superseded fetches are discarded.
    fn complete(&self, id: u64, f: impl FnOnce(&mut QueryState<T>)) -> bool {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.as_ref().map(|f| f.id) != Some(id) {
            return false;
        }
        *in_flight = None;
        self.update(f);
        true
    }

    /// Abort the running fetch, keeping the previous state.
    pub(crate) fn cancel(&self) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(current) = in_flight.take() {
            current.handle.abort();
            self.update(|s| s.fetch_status = FetchStatus::Idle);
            tracing::debug!(query = %self.hash, fetch = current.id, "Cancelled in-flight fetch");
        }
    }

    /// Wait until no fetch is running and return the resulting state.
    pub(crate) async fn settled(&self) -> Result<QueryState<T>, QueryError> {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|s| s.fetch_status != FetchStatus::Fetching).await {
            Ok(state) => Ok(state.clone()),
            Err(_) => Err(QueryError::Removed(self.hash.clone())),
        };
        settled
    }

    pub(crate) fn add_observer(&self) -> usize {
        if let Some(gc) = lock(&self.gc).take() {
            gc.abort();
        }
        self.observers.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn remove_observer(&self) -> usize {
        let previous = self
            .observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.load(Ordering::SeqCst)
    }

    pub(crate) fn set_gc(&self, handle: AbortHandle) {
        if let Some(previous) = lock(&self.gc).replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_gc(&self) {
        if let Some(gc) = lock(&self.gc).take() {
            gc.abort();
        }
    }
}

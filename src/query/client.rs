//! Scoped query client.
//!
//! # Responsibilities
//! - Own every cache entry of one setup (no process-wide state)
//! - Run, join, supersede and cancel fetches
//! - Collect entries nobody observes after `gc_time`
//! - Dehydrate/hydrate entries for persisters

use std::future::Future;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::watch;
use uuid::Uuid;

use crate::lifecycle::shutdown::Teardown;
use crate::observability::metrics;
use crate::query::entry::{FetchMode, Fetcher, QueryEntry};
use crate::query::error::QueryError;
use crate::query::hydration::{DehydratedQuery, DehydratedState};
use crate::query::key::QueryKey;
use crate::query::options::QueryOptions;
use crate::query::state::{now_ms, QueryState};

struct ClientInner<T> {
    id: Uuid,
    queries: DashMap<String, Arc<QueryEntry<T>>>,
    cache_version: Arc<watch::Sender<u64>>,
    teardown: Teardown,
}

/// Handle to one independent cache.
///
/// Cloning shares the cache; separate `new()` calls never interact.
pub struct QueryClient<T> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> QueryClient<T> {
    pub fn new() -> Self {
        let (cache_version, _) = watch::channel(0);
        let id = Uuid::new_v4();
        tracing::debug!(client = %id, "Query client created");
        Self {
            inner: Arc::new(ClientInner {
                id,
                queries: DashMap::new(),
                cache_version: Arc::new(cache_version),
                teardown: Teardown::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.inner.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queries.is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.queries.contains_key(&key.query_hash())
    }

    /// Register the fetch function, seed and options for `key`.
    ///
    /// The seed only applies when the entry does not exist yet.
    pub fn register(&self, key: &QueryKey, fetcher: Fetcher<T>, seed: Option<T>, options: QueryOptions) {
        self.ensure(key, fetcher, seed, options);
    }

    pub(crate) fn ensure(
        &self,
        key: &QueryKey,
        fetcher: Fetcher<T>,
        seed: Option<T>,
        options: QueryOptions,
    ) -> Arc<QueryEntry<T>> {
        if let Some(entry) = self.entry(key) {
            entry.configure(fetcher, options);
            return entry;
        }
        let state = QueryState::new(seed, now_ms());
        self.insert(key, Some(fetcher), state, options)
    }

    fn insert(
        &self,
        key: &QueryKey,
        fetcher: Option<Fetcher<T>>,
        state: QueryState<T>,
        options: QueryOptions,
    ) -> Arc<QueryEntry<T>> {
        let entry = Arc::clone(
            self.inner
                .queries
                .entry(key.query_hash())
                .or_insert_with(|| {
                    QueryEntry::new(
                        key.clone(),
                        fetcher,
                        state,
                        options,
                        Arc::clone(&self.inner.cache_version),
                    )
                })
                .value(),
        );
        self.cache_changed();
        entry
    }

    pub(crate) fn entry(&self, key: &QueryKey) -> Option<Arc<QueryEntry<T>>> {
        self.inner
            .queries
            .get(&key.query_hash())
            .map(|e| Arc::clone(e.value()))
    }

    fn entries(&self) -> Vec<Arc<QueryEntry<T>>> {
        self.inner
            .queries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    fn cache_changed(&self) {
        self.inner
            .cache_version
            .send_modify(|v| *v = v.wrapping_add(1));
        metrics::record_cache_entries(self.inner.queries.len());
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<T> {
        self.entry(key).and_then(|e| e.state().data)
    }

    pub fn get_query_state(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.entry(key).map(|e| e.state())
    }

    /// Write data directly, as if a fetch had just succeeded.
    pub fn set_query_data(&self, key: &QueryKey, data: T) {
        let entry = match self.entry(key) {
            Some(entry) => entry,
            None => self.insert(key, None, QueryState::new(None, 0), QueryOptions::default()),
        };
        entry.update(|s| s.succeed(data, now_ms()));
    }

    /// Subscribe to state changes of one entry.
    pub fn subscribe(&self, key: &QueryKey) -> Option<watch::Receiver<QueryState<T>>> {
        self.entry(key).map(|e| e.subscribe())
    }

    /// Whether a fetch for `key` is running.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entry(key).is_some_and(|entry| entry.is_fetching())
    }

    /// Subscribe to a counter bumped on every change anywhere in the cache.
    pub fn watch_cache(&self) -> watch::Receiver<u64> {
        self.inner.cache_version.subscribe()
    }

    /// Fetch `key`, joining a fetch already in flight.
    pub async fn fetch_query(&self, key: &QueryKey) -> Result<QueryState<T>, QueryError> {
        self.run(key, FetchMode::Dedupe).await
    }

    /// Refetch `key`, superseding a fetch already in flight.
    pub async fn refetch_query(&self, key: &QueryKey) -> Result<QueryState<T>, QueryError> {
        self.run(key, FetchMode::Supersede).await
    }

    async fn run(&self, key: &QueryKey, mode: FetchMode) -> Result<QueryState<T>, QueryError> {
        let entry = self
            .entry(key)
            .ok_or_else(|| QueryError::NotFound(key.query_hash()))?;
        entry.dispatch(mode)?;
        entry.settled().await
    }

    /// Mark `key` stale; observed entries refetch right away.
    pub fn invalidate_queries(&self, key: &QueryKey) {
        if let Some(entry) = self.entry(key) {
            entry.update(|s| s.is_invalidated = true);
            if entry.observer_count() > 0 {
                if let Err(e) = entry.dispatch(FetchMode::Dedupe) {
                    tracing::warn!(query = %key, error = %e, "Refetch after invalidation failed to start");
                }
            }
        }
    }

    /// Host regained focus: refetch stale observed entries that opt in.
    pub fn on_focus(&self) -> usize {
        self.refetch_stale(|o| o.refetch_on_window_focus)
    }

    /// Host regained connectivity: refetch stale observed entries that opt in.
    pub fn on_online(&self) -> usize {
        self.refetch_stale(|o| o.refetch_on_reconnect)
    }

    fn refetch_stale(&self, enabled: impl Fn(&QueryOptions) -> bool) -> usize {
        let now = now_ms();
        let mut started = 0;
        for entry in self.entries() {
            let options = entry.options();
            if entry.observer_count() == 0
                || !enabled(&options)
                || !entry.state().is_stale(options.stale_time, now)
            {
                continue;
            }
            match entry.dispatch(FetchMode::Dedupe) {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!(query = %entry.hash(), error = %e, "Refetch failed to start"),
            }
        }
        started
    }

    /// Abort every in-flight fetch; entries keep their previous state.
    pub fn cancel_queries(&self) {
        for entry in self.entries() {
            entry.cancel();
        }
    }

    /// Drop one entry.
    pub fn remove_query(&self, key: &QueryKey) -> bool {
        match self.inner.queries.remove(&key.query_hash()) {
            Some((_, entry)) => {
                entry.cancel();
                entry.cancel_gc();
                self.cache_changed();
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn remove_queries(&self) {
        let entries = self.entries();
        self.inner.queries.clear();
        for entry in &entries {
            entry.cancel();
            entry.cancel_gc();
        }
        self.cache_changed();
        tracing::debug!(client = %self.inner.id, removed = entries.len(), "Removed queries");
    }

    /// Cancel fetches and drop all cached data.
    pub fn clear(&self) {
        self.cancel_queries();
        self.remove_queries();
    }

    /// Stop every background task bound to this client and cancel fetches.
    pub fn unmount(&self) {
        self.inner.teardown.trigger();
        self.cancel_queries();
        tracing::debug!(client = %self.inner.id, "Query client unmounted");
    }

    /// Resolves once [`QueryClient::unmount`] has been called.
    pub(crate) fn unmounted(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.teardown.stopped()
    }

    /// Successful entries in storable form.
    pub fn dehydrate(&self) -> Vec<DehydratedQuery<T>> {
        let mut queries: Vec<_> = self
            .entries()
            .into_iter()
            .map(|entry| DehydratedQuery {
                state: DehydratedState::from_state(&entry.state()),
                query_key: entry.key().clone(),
                query_hash: entry.hash().to_string(),
            })
            .filter(DehydratedQuery::is_restorable)
            .collect();
        queries.sort_by(|a, b| a.query_hash.cmp(&b.query_hash));
        queries
    }

    /// Apply stored entries; returns how many were applied.
    ///
    /// A stored entry wins over a live one that only holds its seed, or
    /// when it is newer.
    pub fn hydrate(&self, queries: Vec<DehydratedQuery<T>>) -> usize {
        let mut applied = 0;
        for query in queries.into_iter().filter(DehydratedQuery::is_restorable) {
            let key = query.query_key;
            match self.entry(&key) {
                Some(entry) => {
                    let live = entry.state();
                    if live.data_update_count > 0
                        && query.state.data_updated_at <= live.data_updated_at
                    {
                        continue;
                    }
                    let restored = query.state.into_state();
                    entry.update(|s| {
                        let fetch_status = s.fetch_status;
                        *s = restored;
                        s.fetch_status = fetch_status;
                    });
                }
                None => {
                    self.insert(&key, None, query.state.into_state(), QueryOptions::default());
                }
            }
            applied += 1;
        }
        applied
    }

    /// Drop one observer; schedule collection when it was the last.
    pub(crate) fn release_observer(&self, entry: &Arc<QueryEntry<T>>) {
        if entry.remove_observer() > 0 {
            return;
        }
        let Some(gc_time) = entry.options().gc_time else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        let client: Weak<ClientInner<T>> = Arc::downgrade(&self.inner);
        let target = Arc::downgrade(entry);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(gc_time).await;
            let (Some(inner), Some(entry)) = (client.upgrade(), target.upgrade()) else {
                return;
            };
            if entry.observer_count() > 0 {
                return;
            }
            let client = QueryClient { inner };
            if client
                .inner
                .queries
                .remove_if(entry.hash(), |_, live| Arc::ptr_eq(live, &entry))
                .is_some()
            {
                client.cache_changed();
                tracing::debug!(query = %entry.hash(), "Collected unused query");
            }
        });
        entry.set_gc(handle.abort_handle());
    }
}

//! Query cache subsystem.
//!
//! # Data Flow
//! ```text
//! register(key, fetcher, seed, options)
//!     → client.rs creates entry.rs with the seed as initial state
//!
//! observer.rs / refetch / host focus & reconnect
//!     → entry.rs dispatch (join or supersede the in-flight fetch)
//!     → fetcher runs on the Tokio runtime; retry.rs spaces out retries
//!     → state.rs transition published over a watch channel
//!     → observers and cache watchers (persisters) wake up
//! ```
//!
//! # Design Decisions
//! - One client per setup; no process-wide cache
//! - Only the fetch task writes fetched data; everything else reads through watch channels
//! - A failed fetch never discards the last good data

pub mod client;
pub mod entry;
pub mod error;
pub mod hydration;
pub mod key;
pub mod observer;
pub mod options;
pub mod retry;
pub mod state;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

pub use client::QueryClient;
pub use entry::{fetcher, Fetcher};
pub use error::{BoxError, QueryError};
pub use hydration::{DehydratedQuery, DehydratedState};
pub use key::{QueryKey, CONFIG_QUERY_KEY};
pub use observer::{QueryObserver, Registration};
pub use options::{QueryOptions, RefetchOnMount, Retry, RetryDelay};
pub use state::{FetchStatus, QueryResult, QueryState, QueryStatus};

/// Capabilities the rest of the crate needs from a cache engine.
pub trait CacheEngine<T>: Send + Sync {
    /// Register the fetch function, seed and options for `key`.
    fn register(&self, key: &QueryKey, fetcher: Fetcher<T>, seed: Option<T>, options: QueryOptions);

    /// Subscribe to state changes of `key`.
    fn subscribe(&self, key: &QueryKey) -> Option<watch::Receiver<QueryState<T>>>;

    /// Run the fetch function for `key` now.
    fn refetch<'a>(&'a self, key: &'a QueryKey) -> BoxFuture<'a, Result<QueryState<T>, QueryError>>;

    /// Counter bumped on every cache change.
    fn watch_cache(&self) -> watch::Receiver<u64>;

    fn dehydrate(&self) -> Vec<DehydratedQuery<T>>;

    fn hydrate(&self, queries: Vec<DehydratedQuery<T>>) -> usize;

    fn cancel_queries(&self);

    fn clear(&self);

    fn remove_queries(&self);
}

impl<T: Clone + Send + Sync + 'static> CacheEngine<T> for QueryClient<T> {
    fn register(&self, key: &QueryKey, fetcher: Fetcher<T>, seed: Option<T>, options: QueryOptions) {
        QueryClient::register(self, key, fetcher, seed, options)
    }

    fn subscribe(&self, key: &QueryKey) -> Option<watch::Receiver<QueryState<T>>> {
        QueryClient::subscribe(self, key)
    }

    fn refetch<'a>(&'a self, key: &'a QueryKey) -> BoxFuture<'a, Result<QueryState<T>, QueryError>> {
        Box::pin(self.refetch_query(key))
    }

    fn watch_cache(&self) -> watch::Receiver<u64> {
        QueryClient::watch_cache(self)
    }

    fn dehydrate(&self) -> Vec<DehydratedQuery<T>> {
        QueryClient::dehydrate(self)
    }

    fn hydrate(&self, queries: Vec<DehydratedQuery<T>>) -> usize {
        QueryClient::hydrate(self, queries)
    }

    fn cancel_queries(&self) {
        QueryClient::cancel_queries(self)
    }

    fn clear(&self) {
        QueryClient::clear(self)
    }

    fn remove_queries(&self) {
        QueryClient::remove_queries(self)
    }
}

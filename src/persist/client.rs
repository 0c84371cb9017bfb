//! Wiring between a cache engine and a persister.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::persist::error::{PersistError, RestoreError};
use crate::persist::persister::Persister;
use crate::persist::snapshot::PersistedClient;
use crate::query::state::now_ms;
use crate::query::{CacheEngine, DehydratedQuery};

/// Write the current cache contents as one snapshot.
pub fn persist_client<T, E>(
    engine: &E,
    persister: &dyn Persister<T>,
    buster: &str,
) -> Result<(), PersistError>
where
    E: CacheEngine<T> + ?Sized,
{
    let snapshot = PersistedClient::new(buster, now_ms(), engine.dehydrate());
    persister.persist_client(&snapshot)
}

/// Hydrate the cache from the stored snapshot.
///
/// Returns the number of entries applied; 0 when nothing is stored.
pub fn restore_client<T, E>(
    engine: &E,
    persister: &dyn Persister<T>,
    buster: &str,
    max_age: Option<Duration>,
) -> Result<usize, RestoreError>
where
    E: CacheEngine<T> + ?Sized,
{
    let Some(snapshot) = persister.restore_client()? else {
        return Ok(0);
    };

    if snapshot.buster != buster {
        return Err(RestoreError::BusterMismatch {
            expected: buster.to_string(),
            found: snapshot.buster,
        });
    }
    if let Some(max_age) = max_age {
        let age_ms = now_ms().saturating_sub(snapshot.timestamp);
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        if age_ms > max_age_ms {
            return Err(RestoreError::Expired { age_ms, max_age_ms });
        }
    }

    Ok(engine.hydrate(snapshot.client_state.queries))
}

/// [`restore_client`], discarding the stored snapshot on any failure.
pub fn restore_or_discard<T, E>(
    engine: &E,
    persister: &dyn Persister<T>,
    buster: &str,
    max_age: Option<Duration>,
) -> usize
where
    E: CacheEngine<T> + ?Sized,
{
    match restore_client(engine, persister, buster, max_age) {
        Ok(restored) => {
            metrics::record_restore(if restored > 0 { "restored" } else { "empty" });
            tracing::debug!(restored, "Restored persisted config");
            restored
        }
        Err(e) => {
            metrics::record_restore("discarded");
            tracing::warn!(error = %e, "Discarding persisted config snapshot");
            if let Err(e) = persister.remove_client() {
                tracing::warn!(error = %e, "Failed to remove discarded snapshot");
            }
            0
        }
    }
}

fn fingerprint<T>(queries: &[DehydratedQuery<T>]) -> Vec<(String, u64, u64)> {
    queries
        .iter()
        .map(|q| {
            (
                q.query_hash.clone(),
                q.state.data_update_count,
                q.state.data_updated_at,
            )
        })
        .collect()
}

/// Writes a snapshot whenever the cache changes.
///
/// The baseline is taken in [`PersistSubscription::new`]; only changes
/// after that point are written, and changes that leave the stored
/// entries untouched are skipped.
pub struct PersistSubscription<T, E> {
    engine: E,
    persister: Arc<dyn Persister<T>>,
    buster: String,
    cache: watch::Receiver<u64>,
    last: Vec<(String, u64, u64)>,
}

impl<T, E> PersistSubscription<T, E>
where
    T: Send + Sync + 'static,
    E: CacheEngine<T>,
{
    pub fn new(engine: E, persister: Arc<dyn Persister<T>>, buster: String) -> Self {
        let cache = engine.watch_cache();
        let last = fingerprint(&engine.dehydrate());
        Self {
            engine,
            persister,
            buster,
            cache,
            last,
        }
    }

    /// Persist on every change until `stop` resolves.
    pub async fn run<S: Future<Output = ()>>(mut self, stop: S) {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                changed = self.cache.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.persist_if_changed();
                }
            }
        }
        tracing::debug!("Persist subscription stopped");
    }

    fn persist_if_changed(&mut self) {
        let queries = self.engine.dehydrate();
        let current = fingerprint(&queries);
        if current == self.last {
            return;
        }
        self.last = current;

        let snapshot = PersistedClient::new(self.buster.clone(), now_ms(), queries);
        match self.persister.persist_client(&snapshot) {
            Ok(()) => {
                metrics::record_persist("success");
                tracing::debug!(entries = snapshot.client_state.queries.len(), "Persisted config snapshot");
            }
            Err(e) => {
                metrics::record_persist("error");
                tracing::warn!(error = %e, "Failed to persist config snapshot");
            }
        }
    }
}

/// Spawn a [`PersistSubscription`] on the current runtime.
pub fn spawn_persist_subscription<T, E, S>(
    engine: E,
    persister: Arc<dyn Persister<T>>,
    buster: String,
    stop: S,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    E: CacheEngine<T> + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let subscription = PersistSubscription::new(engine, persister, buster);
    tokio::spawn(subscription.run(stop))
}

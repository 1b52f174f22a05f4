use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::ApiError;

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Coalesces concurrent operations that share a key.
///
/// The first caller for a key starts the operation on its own task; everyone
/// arriving while it runs awaits the same outcome. The entry is dropped as soon
/// as the operation settles, so the next call for that key starts fresh.
pub struct Deduplicator<K, V> {
    pending: Arc<Mutex<HashMap<K, SharedOutcome<V>>>>,
}

impl<K, V> Default for Deduplicator<K, V> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Deduplicator<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// `operation` is only invoked when no call for `key` is in flight.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let outcome = {
            let mut pending = lock(&self.pending);
            match pending.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight operation for {:?}", key);
                    existing.clone()
                }
                None => {
                    let outcome = self.start(key.clone(), operation());
                    pending.insert(key, outcome.clone());
                    outcome
                }
            }
        };
        outcome.await
    }

    /// Must be called with the map locked: the spawned task removes its own
    /// entry, and that removal has to happen after the insert.
    fn start<Fut>(&self, key: K, operation: Fut) -> SharedOutcome<V>
    where
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let pending = self.pending.clone();
        let task = tokio::spawn(async move {
            let result = operation.await;
            lock(&pending).remove(&key);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ApiError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Request-scoped batching loader
//!
//! A [`Loader`] turns many individual "fetch by key" calls made while one
//! GraphQL response tree is resolved into a single call to its [`BatchFn`]
//! per distinct key set. It owns two pieces of per-request state:
//!
//! - a cache of resolved keys (including not-found results), and
//! - a pending batch of keys requested since the last dispatch, each with the
//!   callers waiting on it.
//!
//! The first key entering an empty batch schedules a dispatch task that
//! waits [`LoaderOptions::delay`] and then drains the batch. Every `load`
//! issued by futures polled in the meantime joins that batch. A key is handed
//! to the batch function at most once per loader: later requests either join
//! the in-flight batch or are answered from the cache.
//!
//! Loaders are created per request and dropped with it. They must never be
//! shared between requests.

use crate::core::error::{LoadError, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Fetches many values at once.
///
/// Receives deduplicated keys in first-request order. Keys with no matching
/// value are simply left out of the returned map; the loader turns them into
/// [`LoadError::NotFound`] for the callers that asked for them.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static {
    async fn load(&self, keys: &[K]) -> Result<HashMap<K, V>, StorageError>;
}

/// Dispatch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// How long a fresh batch collects keys before it is sent
    pub delay: Duration,

    /// Dispatch immediately once this many distinct keys are pending
    pub max_batch_size: Option<usize>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1),
            max_batch_size: None,
        }
    }
}

type Waiter<V> = oneshot::Sender<Result<V, LoadError>>;

struct State<K, V> {
    /// Settled keys (values and not-found markers)
    cache: HashMap<K, Result<V, LoadError>>,

    /// Callers per key, for keys queued or in flight
    waiters: HashMap<K, Vec<Waiter<V>>>,

    /// Keys not yet handed to the batch function, in request order
    queued: Vec<K>,

    /// Bumped whenever `queued` is drained; stale timers check it and stand down
    batch_id: u64,
}

struct Inner<K, V> {
    name: &'static str,
    entity_type: &'static str,
    batch_fn: Box<dyn BatchFn<K, V>>,
    options: LoaderOptions,
    state: Mutex<State<K, V>>,
    dispatches: AtomicUsize,
}

impl<K, V> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Batching, caching loader for one entity kind.
///
/// Cloning is cheap and every clone shares the same cache and batch.
pub struct Loader<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Debug for Loader<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl<K, V> Loader<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a loader. `entity_type` names the kind in not-found errors.
    pub fn new(
        name: &'static str,
        entity_type: &'static str,
        batch_fn: impl BatchFn<K, V>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                entity_type,
                batch_fn: Box::new(batch_fn),
                options,
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    waiters: HashMap::new(),
                    queued: Vec::new(),
                    batch_id: 0,
                }),
                dispatches: AtomicUsize::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Number of times the batch function has been called
    pub fn dispatch_count(&self) -> usize {
        self.inner.dispatches.load(Ordering::SeqCst)
    }

    /// Load the value for `key`.
    ///
    /// Answers from the cache when the key has already settled in this
    /// loader; otherwise joins the pending (or in-flight) batch for it.
    pub async fn load(&self, key: K) -> Result<V, LoadError> {
        let receiver = {
            let mut state = self.inner.lock();
            if let Some(settled) = state.cache.get(&key) {
                return settled.clone();
            }

            let (sender, receiver) = oneshot::channel();
            let first_request = match state.waiters.entry(key.clone()) {
                Entry::Occupied(mut waiting) => {
                    waiting.get_mut().push(sender);
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(vec![sender]);
                    true
                }
            };
            if first_request {
                state.queued.push(key);
                self.schedule(&mut state);
            }
            receiver
        };

        receiver.await.unwrap_or(Err(LoadError::Aborted {
            entity_type: self.inner.entity_type,
        }))
    }

    /// Load every key; one result per input position, in input order.
    ///
    /// Never fails as a whole: each position carries its own outcome.
    pub async fn load_many(&self, keys: &[K]) -> Vec<Result<V, LoadError>> {
        futures::future::join_all(keys.iter().cloned().map(|key| self.load(key))).await
    }

    /// Seed the cache without fetching. Does nothing if the key has settled.
    ///
    /// Priming a key whose batch is in flight wins over the fetched row.
    pub fn prime(&self, key: K, value: V) {
        self.inner.lock().cache.entry(key).or_insert(Ok(value));
    }

    /// Forget a settled key so the next `load` fetches it again
    pub fn clear(&self, key: &K) {
        self.inner.lock().cache.remove(key);
    }

    /// Forget every settled key
    pub fn clear_all(&self) {
        self.inner.lock().cache.clear();
    }

    fn schedule(&self, state: &mut State<K, V>) {
        let full = self
            .inner
            .options
            .max_batch_size
            .is_some_and(|max| state.queued.len() >= max);

        if full {
            let keys = std::mem::take(&mut state.queued);
            state.batch_id += 1;
            tokio::spawn(dispatch(self.inner.clone(), keys));
        } else if state.queued.len() == 1 {
            let inner = self.inner.clone();
            let batch_id = state.batch_id;
            tokio::spawn(async move {
                if inner.options.delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(inner.options.delay).await;
                }

                let keys = {
                    let mut state = inner.lock();
                    if state.batch_id != batch_id || state.queued.is_empty() {
                        return;
                    }
                    state.batch_id += 1;
                    std::mem::take(&mut state.queued)
                };
                dispatch(inner, keys).await;
            });
        }
    }
}

/// Releases the waiters of a batch that never settled.
///
/// Dropped without being disarmed when the batch function panics or the
/// dispatch task is cancelled; removing the waiter entries drops their
/// senders, so every caller sees [`LoadError::Aborted`] and a later `load`
/// schedules a fresh batch instead of joining a dead one.
struct InFlight<K: Eq + Hash, V> {
    inner: Arc<Inner<K, V>>,
    keys: Vec<K>,
    armed: bool,
}

impl<K: Eq + Hash, V> Drop for InFlight<K, V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.inner.lock();
        for key in &self.keys {
            state.waiters.remove(key);
        }
        tracing::warn!(
            loader = self.inner.name,
            keys = self.keys.len(),
            "batch abandoned before settling"
        );
    }
}

/// Run one batch and settle every waiter for its keys.
///
/// A key primed while its batch was in flight keeps the primed value, and
/// its waiters receive that value too, so one request never observes two
/// different values for the same key.
async fn dispatch<K, V>(inner: Arc<Inner<K, V>>, keys: Vec<K>)
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner.dispatches.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(loader = inner.name, keys = keys.len(), "dispatching batch");

    let mut in_flight = InFlight {
        inner: inner.clone(),
        keys,
        armed: true,
    };
    let outcome = inner.batch_fn.load(&in_flight.keys).await;
    in_flight.armed = false;
    let keys = std::mem::take(&mut in_flight.keys);

    let mut state = inner.lock();
    match outcome {
        Ok(mut found) => {
            for key in keys {
                let result = match state.cache.get(&key) {
                    Some(primed) => primed.clone(),
                    None => {
                        let fetched = found.remove(&key).ok_or_else(|| LoadError::NotFound {
                            entity_type: inner.entity_type,
                            key: key.to_string(),
                        });
                        state.cache.insert(key.clone(), fetched.clone());
                        fetched
                    }
                };
                for waiter in state.waiters.remove(&key).unwrap_or_default() {
                    let _ = waiter.send(result.clone());
                }
            }
        }
        Err(err) => {
            tracing::warn!(loader = inner.name, keys = keys.len(), error = %err, "batch fetch failed");
            // Not cached: a later load for these keys runs a fresh batch.
            let err = LoadError::BatchFetch(Arc::new(err));
            for key in keys {
                let result = match state.cache.get(&key) {
                    Some(primed) => primed.clone(),
                    None => Err(err.clone()),
                };
                for waiter in state.waiters.remove(&key).unwrap_or_default() {
                    let _ = waiter.send(result.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Squares;

    #[async_trait]
    impl BatchFn<i64, i64> for Squares {
        async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, i64>, StorageError> {
            Ok(keys.iter().filter(|k| **k >= 0).map(|k| (*k, k * k)).collect())
        }
    }

    #[tokio::test]
    async fn test_load_resolves_value() {
        let loader = Loader::new("squares", "square", Squares, LoaderOptions::default());
        assert_eq!(loader.load(3).await.unwrap(), 9);
        assert_eq!(loader.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_prime_skips_fetch() {
        let loader = Loader::new("squares", "square", Squares, LoaderOptions::default());
        loader.prime(5, 100);
        assert_eq!(loader.load(5).await.unwrap(), 100);
        assert_eq!(loader.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let loader = Loader::new("squares", "square", Squares, LoaderOptions::default());
        loader.load(2).await.unwrap();
        loader.clear(&2);
        loader.load(2).await.unwrap();
        assert_eq!(loader.dispatch_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let loader = Loader::new("squares", "square", Squares, LoaderOptions::default());
        assert!(loader.load(-1).await.unwrap_err().is_not_found());
        assert!(loader.load(-1).await.unwrap_err().is_not_found());
        assert_eq!(loader.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_delay_still_batches() {
        let options = LoaderOptions {
            delay: Duration::ZERO,
            max_batch_size: None,
        };
        let loader = Loader::new("squares", "square", Squares, options);
        let (a, b) = tokio::join!(loader.load(1), loader.load(2));
        assert_eq!((a.unwrap(), b.unwrap()), (1, 4));
        assert_eq!(loader.dispatch_count(), 1);
    }
}

//! Per-key build coordination.
//!
//! At most one build runs per key. Callers that arrive while a build is in
//! flight await the same shared result. Every build runs in its own spawned
//! task, so it completes even if every caller goes away, and it clears its
//! in-flight marker before any waiter sees the outcome. A build that panics
//! reaches its waiters as [`DeckCacheError::TaskAborted`].

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{DeckCacheError, Result};

pub type SharedBuild<T> = Shared<BoxFuture<'static, std::result::Result<T, Arc<DeckCacheError>>>>;

type InFlight<K, T> = Arc<Mutex<HashMap<K, SharedBuild<T>>>>;

pub struct SingleFlight<K, T> {
    inflight: InFlight<K, T>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Removes a key's in-flight entry when dropped.
struct ClearMarker<K: Eq + Hash, T> {
    registry: InFlight<K, T>,
    key: K,
}

impl<K: Eq + Hash, T> Drop for ClearMarker<K, T> {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.key);
    }
}

fn lock<K, T>(inflight: &InFlight<K, T>) -> MutexGuard<'_, HashMap<K, SharedBuild<T>>> {
    inflight.lock().unwrap_or_else(|e| e.into_inner())
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight build for `key`, or start `build` if there is none.
    ///
    /// Returns the shared handle and whether this call started the build.
    /// `build` is only invoked when a new build starts.
    pub fn join_or_start<F, Fut>(&self, key: K, build: F) -> (SharedBuild<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut inflight = lock(&self.inflight);
        if let Some(existing) = inflight.get(&key) {
            return (existing.clone(), false);
        }

        let marker = ClearMarker {
            registry: Arc::clone(&self.inflight),
            key: key.clone(),
        };
        let fut = build();
        // The guard lives inside the task: the marker is cleared however the
        // build ends, before the join handle resolves.
        let handle = tokio::spawn(async move {
            let _marker = marker;
            fut.await
        });
        let task = async move {
            match handle.await {
                Ok(result) => result.map_err(Arc::new),
                Err(e) => Err(Arc::new(DeckCacheError::TaskAborted(e.to_string()))),
            }
        }
        .boxed()
        .shared();

        inflight.insert(key, task.clone());
        (task, true)
    }

    /// Run `build` exclusively for `key`, or wait for the build already running.
    pub async fn run_exclusive<F, Fut>(
        &self,
        key: K,
        build: F,
    ) -> std::result::Result<T, Arc<DeckCacheError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (task, _) = self.join_or_start(key, build);
        task.await
    }

    /// Start `build` in the background unless one is already running for `key`.
    /// Returns `true` if a new build was started.
    pub fn trigger<F, Fut>(&self, key: K, build: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.join_or_start(key, build).1
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.inflight).len()
    }
}

//! Coalesces concurrent calls for the same key into one execution.
//!
//! The first caller for a key spawns the work onto the runtime; every caller
//! that arrives while it is in flight awaits the same [`Shared`] handle and
//! receives a clone of its output. The spawned task owns its registry entry
//! and removes it when the work finishes, whether or not anyone is still
//! waiting, so cancelled callers never leave work parked half-done.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

/// The spawned work panicked or the runtime shut down before it finished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("in-flight work aborted: {0}")]
pub struct FlightAborted(pub String);

type Flight<V> = Shared<BoxFuture<'static, Result<V, FlightAborted>>>;
type Registry<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

/// Per-key in-flight registry.
pub struct SingleFlight<K, V> {
    inflight: Registry<K, V>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<K, V> SingleFlight<K, V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with work currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Removes the entry for `key` when the spawned task ends, panics included.
struct Landing<K: Eq + Hash, V> {
    registry: Registry<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for Landing<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Runs `work` for `key`, or joins the execution already in flight.
    ///
    /// `work` is only invoked by the caller that starts a new flight, and the
    /// future it returns runs on its own task. Dropping every waiter does not
    /// cancel it.
    ///
    /// # Errors
    ///
    /// Returns [`FlightAborted`] if the spawned work panicked.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, FlightAborted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let landing = Landing {
                    registry: Arc::clone(&self.inflight),
                    key: Some(key.clone()),
                };
                let task = work();
                // The registry lock is held until the entry is inserted, so the
                // task cannot remove it before it exists.
                let handle = tokio::spawn(async move {
                    let _landing = landing;
                    task.await
                });
                let flight = handle
                    .map(|joined| joined.map_err(|e| FlightAborted(e.to_string())))
                    .boxed()
                    .shared();
                inflight.insert(key, flight.clone());
                flight
            }
        };

        flight.await
    }
}

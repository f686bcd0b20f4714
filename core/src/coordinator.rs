//! Single-flight request coordination.
//!
//! At most one computation per [`ContentKey`] is in flight at a time. The first
//! caller spawns the computation on its own task; later callers for the same key
//! attach to a `watch` channel and receive a clone of the same result.
//!
//! The computation is detached from every caller: dropping or aborting a caller
//! (including the one that started it) does not cancel the shared work, so the
//! remaining waiters still get the result and any cache write inside the
//! computation still happens.

use crate::key::ContentKey;
use crate::{PodiumError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

type Slot<T> = watch::Receiver<Option<T>>;

pub struct RequestCoordinator<T> {
    in_flight: Arc<DashMap<ContentKey, Slot<T>>>,
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Run `compute` for `key` unless an identical computation is already running,
    /// in which case wait for that one instead.
    ///
    /// `compute` is only invoked by the caller that starts the flight.
    pub async fn run<F, Fut>(&self, key: ContentKey, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let rx = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) if !is_abandoned(slot.get()) => {
                debug!(target = "coordinator", key = %key, "Joining in-flight computation");
                slot.get().clone()
            }
            // A panicked flight whose waiters have not cleaned up yet
            Entry::Occupied(mut slot) => {
                let rx = self.start(&key, compute);
                slot.insert(rx.clone());
                rx
            }
            Entry::Vacant(slot) => {
                let rx = self.start(&key, compute);
                slot.insert(rx.clone());
                rx
            }
        };

        let mut waiter = rx.clone();
        let published = waiter.wait_for(|v| v.is_some()).await.map(|v| (*v).clone());
        match published {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(PodiumError::CoordinatorError(format!(
                "empty result for {}",
                key
            ))),
            Err(_) => {
                // Sender dropped without publishing: the computation panicked.
                // Another waiter may already have registered a retry under this key.
                self.in_flight
                    .remove_if(&key, |_, slot| slot.same_channel(&rx));
                Err(PodiumError::CoordinatorError(format!(
                    "computation for {} aborted",
                    key
                )))
            }
        }
    }

    fn start<F, Fut>(&self, key: &ContentKey, compute: F) -> Slot<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        trace!(target = "coordinator", key = %key, "Starting computation");

        let fut = compute();
        let in_flight = Arc::clone(&self.in_flight);
        let flight_key = key.clone();
        let own = rx.clone();
        tokio::spawn(async move {
            let value = fut.await;
            // Publish before unregistering so no caller sees an empty slot.
            let _ = tx.send(Some(value));
            in_flight.remove_if(&flight_key, |_, slot| slot.same_channel(&own));
        });
        rx
    }

    /// Number of computations currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// The computation ended without publishing a value.
fn is_abandoned<T>(slot: &Slot<T>) -> bool {
    slot.has_changed().is_err() && slot.borrow().is_none()
}

impl<T> Default for RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

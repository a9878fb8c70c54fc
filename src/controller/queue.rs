//! Deduplicating, rate-limited work queue
//!
//! Semantics:
//! - an item waiting in the queue is never queued twice;
//! - an item handed out by [`WorkQueue::get`] stays in-flight until
//!   [`WorkQueue::done`]; adds while in-flight are deferred and re-queued on `done`,
//!   so no two workers process the same item at once;
//! - [`WorkQueue::add_rate_limited`] re-adds after a per-item exponential delay.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::backoff::ItemExponentialBackoff;

#[derive(Debug)]
struct QueueState<T> {
    queue: VecDeque<T>,
    /// Items that need processing: queued, or re-added while in-flight
    dirty: HashSet<T>,
    /// Items currently held by a worker
    processing: HashSet<T>,
    shutting_down: bool,
}

#[derive(Debug)]
struct Shared<T> {
    name: String,
    state: Mutex<QueueState<T>>,
    limiter: Mutex<ItemExponentialBackoff<T>>,
    notify: Notify,
    /// Cancels delayed adds that are still sleeping
    shutdown: CancellationToken,
}

/// Cloneable handle to a named work queue
#[derive(Debug)]
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T> WorkQueue<T>
where
    T: Eq + Hash + Clone + Send + Sync + std::fmt::Display + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_backoff(name, ItemExponentialBackoff::default())
    }

    pub fn with_backoff(name: impl Into<String>, backoff: ItemExponentialBackoff<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                limiter: Mutex::new(backoff),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Queue `item` unless it is already waiting; no-op after shutdown
    pub fn add(&self, item: T) {
        let mut state = lock(&self.shared.state);
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }

        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            // picked up again by `done`
            return;
        }

        state.queue.push_back(item);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Add `item` once `delay` has elapsed
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }

        let queue = self.clone();
        let shutdown = self.shared.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => queue.add(item),
            }
        });
    }

    /// Re-add `item` after its backoff delay
    pub fn add_rate_limited(&self, item: T) {
        let delay = lock(&self.shared.limiter).when(&item);
        debug!(queue = %self.shared.name, "Requeuing {} in {:?}", item, delay);
        self.add_after(item, delay);
    }

    /// Reset the backoff of `item` after a successful reconcile
    pub fn forget(&self, item: &T) {
        lock(&self.shared.limiter).forget(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        lock(&self.shared.limiter).num_requeues(item)
    }

    /// Wait for the next item; `None` once the queue is shut down and drained of waiters
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = lock(&self.shared.state);
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        // hand the permit on to another idle worker
                        self.shared.notify.notify_one();
                    }
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark `item` as processed; queues it again if it was re-added meanwhile
    pub fn done(&self, item: &T) {
        let mut state = lock(&self.shared.state);
        state.processing.remove(item);
        if state.dirty.contains(item) && !state.shutting_down {
            state.queue.push_back(item.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Stop accepting items and wake every waiting worker
    pub fn shut_down(&self) {
        let mut state = lock(&self.shared.state);
        state.shutting_down = true;
        state.queue.clear();
        state.dirty.clear();
        drop(state);
        self.shared.shutdown.cancel();
        self.shared.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        lock(&self.shared.state).shutting_down
    }

    /// Number of items waiting to be handed out
    pub fn len(&self) -> usize {
        lock(&self.shared.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

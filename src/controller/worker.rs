//! Worker loop draining the work queue into the reconciler

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::key::ResourceKey;
use super::metrics;
use super::queue::WorkQueue;
use super::reconciler::Reconciler;

/// Process keys until the queue shuts down
///
/// Success forgets the key's backoff; a retriable failure re-adds it rate
/// limited. Either way the key is marked done so it can be queued again.
pub async fn run_worker(id: usize, queue: WorkQueue<ResourceKey>, reconciler: Arc<Reconciler>) {
    debug!(worker = id, "Worker started");

    while let Some(key) = queue.get().await {
        metrics::set_workqueue_depth(queue.len());
        process(&queue, &reconciler, &key).await;
        queue.done(&key);
    }

    debug!(worker = id, "Worker stopped");
}

async fn process(queue: &WorkQueue<ResourceKey>, reconciler: &Reconciler, key: &ResourceKey) {
    let start = Instant::now();
    let result = reconciler.reconcile(key).await;
    metrics::observe_reconcile_duration_seconds(start.elapsed().as_secs_f64());

    match result {
        Ok(()) => queue.forget(key),
        Err(e) if e.is_retriable() => {
            metrics::inc_reconcile_error(e.kind());
            warn!(
                "Reconcile of {} failed (attempt {}), requeuing: {}",
                key,
                queue.num_requeues(key) + 1,
                e
            );
            queue.add_rate_limited(key.clone());
        }
        Err(e) => {
            metrics::inc_reconcile_error(e.kind());
            warn!("Reconcile of {} failed, not retrying: {}", key, e);
            queue.forget(key);
        }
    }
}

//! Periodic full resync and orphan garbage collection
//!
//! The event-driven path only lowers latency. This pass is what guarantees
//! convergence: it drops state for vanished resources, deletes SslCertificates
//! nobody owns, and re-enqueues every live key.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cache::ManagedCertificateCache;
use super::key::ResourceKey;
use super::metrics;
use super::queue::WorkQueue;
use super::ssl_manager::SslCertificateManager;
use super::state::StateStore;
use crate::error::Result;

/// What one resync pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub removed_entries: Vec<ResourceKey>,
    pub deleted_orphans: Vec<String>,
    pub failed_orphans: Vec<String>,
    pub enqueued: usize,
}

pub struct Resynchronizer {
    state: Arc<StateStore>,
    cache: Arc<dyn ManagedCertificateCache>,
    certificates: SslCertificateManager,
    queue: WorkQueue<ResourceKey>,
    prefix: String,
}

impl Resynchronizer {
    pub fn new(
        state: Arc<StateStore>,
        cache: Arc<dyn ManagedCertificateCache>,
        certificates: SslCertificateManager,
        queue: WorkQueue<ResourceKey>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            state,
            cache,
            certificates,
            queue,
            prefix: prefix.into(),
        }
    }

    /// Run one pass every `period` until `shutdown` fires
    pub async fn run(&self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; startup already enqueues everything
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Resync loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.resync().await {
                        error!("Resync failed: {}", e);
                    }
                }
            }
        }
    }

    /// A single resync pass
    pub async fn resync(&self) -> Result<ResyncReport> {
        let mut report = ResyncReport::default();

        // no reconcile may create and record a certificate between the
        // snapshots below and the orphan deletes
        let ownership = self.state.exclusive().await;

        let live: BTreeSet<ResourceKey> = self
            .cache
            .list()?
            .iter()
            .map(|mcrt| ResourceKey::from_resource(mcrt))
            .collect();

        for key in self.state.all_keys() {
            if !live.contains(&key) {
                info!("ManagedCertificate {} no longer exists, dropping its state", key);
                self.state.delete(&key);
                report.removed_entries.push(key);
            }
        }
        metrics::set_managed_certificates(self.state.len());

        self.collect_orphans(&mut report).await;
        drop(ownership);

        for key in live {
            self.queue.add(key);
            report.enqueued += 1;
        }
        metrics::set_workqueue_depth(self.queue.len());

        info!(
            removed = report.removed_entries.len(),
            orphans = report.deleted_orphans.len(),
            failed = report.failed_orphans.len(),
            enqueued = report.enqueued,
            "Resync complete"
        );
        Ok(report)
    }

    // Best effort: a failed delete never stops the others.
    async fn collect_orphans(&self, report: &mut ResyncReport) {
        let provisioned = match self.certificates.list().await {
            Ok(certs) => certs,
            Err(e) => {
                warn!("Skipping orphan collection, cannot list SslCertificates: {}", e);
                return;
            }
        };

        let owned = self.state.all_cert_names();
        let orphans = provisioned
            .into_iter()
            .filter(|cert| cert.is_managed() && cert.name.starts_with(&self.prefix))
            .map(|cert| cert.name)
            .filter(|name| !owned.contains(name));

        for name in orphans {
            match self.certificates.delete(&name, None).await {
                Ok(()) => {
                    info!("Deleted orphaned SslCertificate {}", name);
                    metrics::inc_orphans_deleted();
                    report.deleted_orphans.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete orphaned SslCertificate {}: {}", name, e);
                    report.failed_orphans.push(name);
                }
            }
        }
    }
}

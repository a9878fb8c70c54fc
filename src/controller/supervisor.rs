//! Startup and lifecycle of the controller loops
//!
//! Order: pump changes into the queue, wait for the cache to sync, rebuild the
//! state store from observed status, then start the workers and the resync
//! loop. A stop signal or the first loop that ends on its own cancels
//! everything, and `run` returns only after every loop has stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::cache::{Change, ManagedCertificateCache};
use super::key::ResourceKey;
use super::metrics;
use super::queue::WorkQueue;
use super::reconciler::{CertificateNamer, RandomNamer, Reconciler};
use super::resync::Resynchronizer;
use super::ssl_manager::SslCertificateManager;
use super::state::StateStore;
use super::worker::run_worker;
use crate::error::{Error, Result};

/// Prefix of every SslCertificate this controller creates
pub const DEFAULT_CERTIFICATE_PREFIX: &str = "mcrt-";

// 63 character name limit minus 32 random hex characters
const MAX_PREFIX_LENGTH: usize = 31;

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub workers: usize,
    pub resync_interval: Duration,
    pub cache_sync_timeout: Duration,
    pub certificate_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            resync_interval: Duration::from_secs(60),
            cache_sync_timeout: Duration::from_secs(120),
            certificate_prefix: DEFAULT_CERTIFICATE_PREFIX.to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigError("workers must be at least 1".to_string()));
        }
        if self.resync_interval.is_zero() {
            return Err(Error::ConfigError(
                "resync interval must be positive".to_string(),
            ));
        }

        let prefix = &self.certificate_prefix;
        let valid_chars = prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let starts_with_letter = prefix.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        if prefix.len() > MAX_PREFIX_LENGTH || !valid_chars || !starts_with_letter {
            return Err(Error::ConfigError(format!(
                "certificate prefix {prefix:?} must start with a lowercase letter, contain only \
                 [a-z0-9-] and be at most {MAX_PREFIX_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Rebuild the state store from the certificate names reported in status
pub fn initialize_state(
    cache: &dyn ManagedCertificateCache,
    state: &StateStore,
) -> Result<usize> {
    let resources = cache
        .list()
        .map_err(|e| Error::StateInitializationError(e.to_string()))?;

    for mcrt in &resources {
        if let Some(cert_name) = mcrt.status_certificate_name() {
            state.put(ResourceKey::from_resource(mcrt), cert_name);
        }
    }

    metrics::set_managed_certificates(state.len());
    Ok(state.len())
}

pub struct Supervisor {
    config: ControllerConfig,
    state: Arc<StateStore>,
    cache: Arc<dyn ManagedCertificateCache>,
    certificates: SslCertificateManager,
    namer: Arc<dyn CertificateNamer>,
    ready: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(
        config: ControllerConfig,
        cache: Arc<dyn ManagedCertificateCache>,
        certificates: SslCertificateManager,
    ) -> Self {
        let namer = Arc::new(RandomNamer::new(config.certificate_prefix.clone()));
        Self {
            config,
            state: Arc::new(StateStore::new()),
            cache,
            certificates,
            namer,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_namer(mut self, namer: Arc<dyn CertificateNamer>) -> Self {
        self.namer = namer;
        self
    }

    pub fn with_state(mut self, state: Arc<StateStore>) -> Self {
        self.state = state;
        self
    }

    /// Flag raised once the loops are running
    pub fn readiness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ready)
    }

    /// Run until `shutdown` fires or a loop fails
    pub async fn run(
        self,
        changes: BoxStream<'static, Change>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        self.config.validate()?;

        let queue: WorkQueue<ResourceKey> = WorkQueue::new("managed-certificates");
        let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

        tasks.spawn(pump_changes(changes, queue.clone(), shutdown.clone()));

        let started = self.start(&queue, &mut tasks, &shutdown).await;
        let result = match started {
            Ok(()) if shutdown.is_cancelled() => Ok(()),
            Ok(()) => {
                self.ready.store(true, Ordering::SeqCst);
                info!("Controller running with {} worker(s)", self.config.workers);
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!("Stop requested, shutting down controller loops");
                        Ok(())
                    }
                    Some(joined) = tasks.join_next() => loop_ended(joined),
                }
            }
            Err(e) => Err(e),
        };

        self.ready.store(false, Ordering::SeqCst);
        shutdown.cancel();
        queue.shut_down();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Controller loop panicked during shutdown: {}", e);
            }
        }

        if let Err(e) = &result {
            error!("Controller stopped: {}", e);
        }
        result
    }

    async fn start(
        &self,
        queue: &WorkQueue<ResourceKey>,
        tasks: &mut JoinSet<(&'static str, Result<()>)>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        info!("Waiting for ManagedCertificate cache to sync");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            synced = tokio::time::timeout(self.config.cache_sync_timeout, self.cache.wait_until_synced()) => {
                synced.map_err(|_| Error::CacheSyncTimeout(self.config.cache_sync_timeout))??;
            }
            Some(joined) = tasks.join_next() => return loop_ended(joined),
        }

        let restored = initialize_state(self.cache.as_ref(), &self.state)?;
        info!("Restored {} SslCertificate assignment(s) from status", restored);

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&self.state),
            Arc::clone(&self.cache),
            self.certificates.clone(),
            Arc::clone(&self.namer),
        ));
        for id in 0..self.config.workers {
            let queue = queue.clone();
            let reconciler = Arc::clone(&reconciler);
            tasks.spawn(async move {
                run_worker(id, queue, reconciler).await;
                ("worker", Ok(()))
            });
        }

        let resync = Resynchronizer::new(
            Arc::clone(&self.state),
            Arc::clone(&self.cache),
            self.certificates.clone(),
            queue.clone(),
            self.config.certificate_prefix.clone(),
        );
        let period = self.config.resync_interval;
        let token = shutdown.clone();
        tasks.spawn(async move {
            resync.run(period, token).await;
            ("resync", Ok(()))
        });

        Ok(())
    }
}

// Any loop ending while the controller should be running is fatal.
fn loop_ended(
    joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok((name, Ok(()))) => Err(Error::LoopTerminated(
            name.to_string(),
            "exited unexpectedly".to_string(),
        )),
        Ok((_, Err(e @ Error::LoopTerminated(..)))) => Err(e),
        Ok((name, Err(e))) => Err(Error::LoopTerminated(name.to_string(), e.to_string())),
        Err(e) => Err(Error::LoopTerminated("task".to_string(), e.to_string())),
    }
}

/// Feed change notifications into the queue until the stream ends or `shutdown` fires
async fn pump_changes(
    mut changes: BoxStream<'static, Change>,
    queue: WorkQueue<ResourceKey>,
    shutdown: CancellationToken,
) -> (&'static str, Result<()>) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return ("changes", Ok(())),
            change = changes.next() => match change {
                Some(change) => {
                    debug!("Enqueuing {:?}", change);
                    queue.add(change.into_key());
                    metrics::set_workqueue_depth(queue.len());
                }
                None => {
                    return (
                        "changes",
                        Err(Error::LoopTerminated(
                            "changes".to_string(),
                            "watch stream ended".to_string(),
                        )),
                    )
                }
            }
        }
    }
}

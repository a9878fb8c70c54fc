//! ManagedCertificate controller
//!
//! Change notifications feed a deduplicating work queue, workers reconcile one
//! key at a time against the provisioning backend, and a periodic resync
//! collects orphans and re-enqueues every live resource.

mod backoff;
pub mod cache;
pub mod events;
pub mod key;
pub mod metrics;
pub mod queue;
mod reconciler;
mod resync;
pub mod ssl_manager;
pub mod state;
pub mod status;
mod supervisor;
#[cfg(test)]
mod test_support;
mod worker;

pub use backoff::{calculate_backoff, ItemExponentialBackoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use cache::{watch, Change, KubeCache, ManagedCertificateCache};
pub use events::{CertificateEvent, EventRecorder, KubeEventRecorder};
pub use key::ResourceKey;
pub use queue::WorkQueue;
pub use reconciler::{CertificateNamer, RandomNamer, Reconciler};
pub use resync::{ResyncReport, Resynchronizer};
pub use ssl_manager::SslCertificateManager;
pub use state::StateStore;
pub use supervisor::{initialize_state, ControllerConfig, Supervisor, DEFAULT_CERTIFICATE_PREFIX};
pub use worker::run_worker;

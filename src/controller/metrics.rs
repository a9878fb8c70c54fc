//! Prometheus metrics for the managed certificate controller
//!
//! # Exported metrics
//! - `managed_certs_reconcile_duration_seconds` (histogram): reconcile duration.
//! - `managed_certs_reconcile_errors_total` (counter): reconcile errors labeled by kind.
//! - `managed_certs_provider_operations_total` (counter): provider calls labeled by operation/outcome.
//! - `managed_certs_orphans_deleted_total` (counter): SslCertificates removed by orphan GC.
//! - `managed_certs_workqueue_depth` (gauge): items waiting in the work queue.
//! - `managed_certs_managed_certificates` (gauge): entries in the state store.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for reconcile error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Error kind, e.g. "kube", "quota_exceeded", "backend"
    pub kind: String,
}

/// Labels for provider call metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProviderLabels {
    /// "create", "delete", "exists", "get" or "list"
    pub operation: String,
    /// "success", "not_found", "quota_exceeded" or "error"
    pub outcome: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Histogram> =
    // 1ms .. ~32s across 16 buckets.
    Lazy::new(|| Histogram::new(exponential_buckets(0.001, 2.0, 16)));

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking provider operations
pub static PROVIDER_OPERATIONS_TOTAL: Lazy<Family<ProviderLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking orphaned SslCertificates deleted by resync
pub static ORPHANS_DELETED_TOTAL: Lazy<Counter<u64, AtomicU64>> = Lazy::new(Counter::default);

/// Gauge tracking work queue depth
pub static WORKQUEUE_DEPTH: Lazy<Gauge<i64, AtomicI64>> = Lazy::new(Gauge::default);

/// Gauge tracking state store size
pub static MANAGED_CERTIFICATES: Lazy<Gauge<i64, AtomicI64>> = Lazy::new(Gauge::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "managed_certs_reconcile_duration_seconds",
        "Duration of single-key reconciles in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "managed_certs_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "managed_certs_provider_operations",
        "Total number of SslCertificate API calls",
        PROVIDER_OPERATIONS_TOTAL.clone(),
    );
    registry.register(
        "managed_certs_orphans_deleted",
        "Total number of orphaned SslCertificates deleted",
        ORPHANS_DELETED_TOTAL.clone(),
    );
    registry.register(
        "managed_certs_workqueue_depth",
        "Number of keys waiting in the work queue",
        WORKQUEUE_DEPTH.clone(),
    );
    registry.register(
        "managed_certs_managed_certificates",
        "Number of ManagedCertificates with an owned SslCertificate",
        MANAGED_CERTIFICATES.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(seconds: f64) {
    RECONCILE_DURATION_SECONDS.observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(kind: &str) {
    let labels = ErrorLabels {
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Record the outcome of a provider call.
pub fn inc_provider_operation(operation: &str, outcome: &str) {
    let labels = ProviderLabels {
        operation: operation.to_string(),
        outcome: outcome.to_string(),
    };
    PROVIDER_OPERATIONS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_orphans_deleted() {
    ORPHANS_DELETED_TOTAL.inc();
}

pub fn set_workqueue_depth(depth: usize) {
    WORKQUEUE_DEPTH.set(depth as i64);
}

pub fn set_managed_certificates(count: usize) {
    MANAGED_CERTIFICATES.set(count as i64);
}

//! SslCertificate lifecycle on top of the provisioning backend
//!
//! Every call classifies provider errors, records a provider metric and, when a
//! ManagedCertificate is given, attaches an event to it. Without a resource
//! (orphan GC) failures are only logged.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::events::{CertificateEvent, EventRecorder};
use super::metrics;
use crate::crd::ManagedCertificate;
use crate::provider::{ProviderError, SslCertificate, SslCertificateApi};

fn outcome(result: &Result<impl Sized, ProviderError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ProviderError::NotFound(_)) => "not_found",
        Err(ProviderError::QuotaExceeded(_)) => "quota_exceeded",
        Err(ProviderError::Backend(_)) => "error",
    }
}

#[derive(Clone)]
pub struct SslCertificateManager {
    api: Arc<dyn SslCertificateApi>,
    events: Arc<dyn EventRecorder>,
}

impl SslCertificateManager {
    pub fn new(api: Arc<dyn SslCertificateApi>, events: Arc<dyn EventRecorder>) -> Self {
        Self { api, events }
    }

    async fn record(&self, mcrt: Option<&ManagedCertificate>, event: CertificateEvent) {
        match mcrt {
            Some(mcrt) => self.events.record(mcrt, event).await,
            None => debug!("No resource to attach {} event to: {}", event.reason(), event.message()),
        }
    }

    async fn backend_error(&self, mcrt: Option<&ManagedCertificate>, err: &ProviderError) {
        self.record(
            mcrt,
            CertificateEvent::BackendError {
                error: err.to_string(),
            },
        )
        .await;
    }

    /// Create SslCertificate `name` for the domains of `mcrt`
    pub async fn create(&self, name: &str, mcrt: &ManagedCertificate) -> Result<(), ProviderError> {
        let result = self.api.create(name, &mcrt.spec.domains).await;
        metrics::inc_provider_operation("create", outcome(&result));

        match &result {
            Ok(()) => {
                info!(
                    "Created SslCertificate {} for ManagedCertificate {}/{}",
                    name,
                    mcrt.namespace().unwrap_or_default(),
                    mcrt.name_any()
                );
                self.record(
                    Some(mcrt),
                    CertificateEvent::Created {
                        certificate: name.to_string(),
                    },
                )
                .await;
            }
            Err(e @ ProviderError::QuotaExceeded(_)) => {
                warn!("Quota exceeded creating SslCertificate {}: {}", name, e);
                self.record(
                    Some(mcrt),
                    CertificateEvent::TooManyCertificates {
                        error: e.to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                warn!("Failed to create SslCertificate {}: {}", name, e);
                self.backend_error(Some(mcrt), e).await;
            }
        }

        result
    }

    /// Delete SslCertificate `name`; a missing certificate counts as deleted
    pub async fn delete(
        &self,
        name: &str,
        mcrt: Option<&ManagedCertificate>,
    ) -> Result<(), ProviderError> {
        let result = self.api.delete(name).await;
        metrics::inc_provider_operation("delete", outcome(&result));

        match result {
            Ok(()) => {
                info!("Deleted SslCertificate {}", name);
                self.record(
                    mcrt,
                    CertificateEvent::Deleted {
                        certificate: name.to_string(),
                    },
                )
                .await;
                Ok(())
            }
            Err(ProviderError::NotFound(_)) => {
                debug!("SslCertificate {} already gone", name);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to delete SslCertificate {}: {}", name, e);
                self.backend_error(mcrt, &e).await;
                Err(e)
            }
        }
    }

    pub async fn exists(
        &self,
        name: &str,
        mcrt: Option<&ManagedCertificate>,
    ) -> Result<bool, ProviderError> {
        let result = self.api.exists(name).await;
        metrics::inc_provider_operation("exists", outcome(&result));

        if let Err(e) = &result {
            warn!("Failed to check SslCertificate {}: {}", name, e);
            self.backend_error(mcrt, e).await;
        }
        result
    }

    pub async fn get(
        &self,
        name: &str,
        mcrt: Option<&ManagedCertificate>,
    ) -> Result<SslCertificate, ProviderError> {
        let result = self.api.get(name).await;
        metrics::inc_provider_operation("get", outcome(&result));

        if let Err(e) = &result {
            warn!("Failed to get SslCertificate {}: {}", name, e);
            self.backend_error(mcrt, e).await;
        }
        result
    }

    /// Fetch a certificate this controller just created
    ///
    /// Compute inserts are asynchronous operations, so a not-found answer here
    /// means the insert has not landed yet. That is logged and returned for a
    /// requeue without a BackendError event.
    pub async fn get_created(
        &self,
        name: &str,
        mcrt: &ManagedCertificate,
    ) -> Result<SslCertificate, ProviderError> {
        let result = self.api.get(name).await;
        metrics::inc_provider_operation("get", outcome(&result));

        match &result {
            Ok(_) => {}
            Err(ProviderError::NotFound(_)) => {
                debug!("SslCertificate {} not visible yet, insert still pending", name);
            }
            Err(e) => {
                warn!("Failed to get SslCertificate {}: {}", name, e);
                self.backend_error(Some(mcrt), e).await;
            }
        }
        result
    }

    /// Every certificate in the project; used by orphan GC only
    pub async fn list(&self) -> Result<Vec<SslCertificate>, ProviderError> {
        let result = self.api.list().await;
        metrics::inc_provider_operation("list", outcome(&result));
        if let Err(e) = &result {
            warn!("Failed to list SslCertificates: {}", e);
        }
        result
    }
}

//! Per-key reconciliation of a ManagedCertificate against its SslCertificate
//!
//! The state entry for a key is only written after the provider call that
//! justifies it succeeded, so the state store never claims a certificate that
//! was not created. Create and record happen under one ownership claim.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::cache::ManagedCertificateCache;
use super::key::ResourceKey;
use super::metrics;
use super::ssl_manager::SslCertificateManager;
use super::state::StateStore;
use super::status::build_status;
use crate::crd::{ManagedCertificate, ManagedCertificateSpec};
use crate::error::{Error, Result};
use crate::provider::SslCertificate;

/// Chooses the SslCertificate name for a newly provisioned certificate
pub trait CertificateNamer: Send + Sync {
    fn name_for(&self, key: &ResourceKey) -> String;
}

/// `<prefix><32 random hex chars>`
#[derive(Clone, Debug)]
pub struct RandomNamer {
    prefix: String,
}

impl RandomNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl CertificateNamer for RandomNamer {
    fn name_for(&self, _key: &ResourceKey) -> String {
        format!("{}{:032x}", self.prefix, rand::random::<u128>())
    }
}

fn same_domains(declared: &[String], provisioned: &[String]) -> bool {
    let normalize = |domains: &[String]| -> BTreeSet<String> {
        domains.iter().map(|d| d.to_ascii_lowercase()).collect()
    };
    normalize(declared) == normalize(provisioned)
}

// Stand-in for a resource that is already gone, so events can still reference it.
fn tombstone(key: &ResourceKey) -> ManagedCertificate {
    let mut mcrt = ManagedCertificate::new(&key.name, ManagedCertificateSpec::default());
    mcrt.metadata.namespace = Some(key.namespace.clone());
    mcrt
}

pub struct Reconciler {
    state: Arc<StateStore>,
    cache: Arc<dyn ManagedCertificateCache>,
    certificates: SslCertificateManager,
    namer: Arc<dyn CertificateNamer>,
}

impl Reconciler {
    pub fn new(
        state: Arc<StateStore>,
        cache: Arc<dyn ManagedCertificateCache>,
        certificates: SslCertificateManager,
        namer: Arc<dyn CertificateNamer>,
    ) -> Self {
        Self {
            state,
            cache,
            certificates,
            namer,
        }
    }

    /// Bring the SslCertificate of `key` in line with its ManagedCertificate
    #[instrument(skip(self), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<()> {
        let mcrt = self.cache.get(key);
        let entry = self.state.get(key);

        let result = match (mcrt, entry) {
            (None, None) => {
                debug!("ManagedCertificate {} gone and owns nothing", key);
                Ok(())
            }
            (None, Some(cert_name)) => self.release(key, &cert_name).await,
            (Some(mcrt), _) => self.ensure(key, &mcrt).await,
        };

        metrics::set_managed_certificates(self.state.len());
        result
    }

    async fn release(&self, key: &ResourceKey, cert_name: &str) -> Result<()> {
        info!(
            "ManagedCertificate {} deleted, releasing SslCertificate {}",
            key, cert_name
        );
        self.certificates
            .delete(cert_name, Some(&tombstone(key)))
            .await?;
        self.state.delete(key);
        Ok(())
    }

    async fn ensure(&self, key: &ResourceKey, mcrt: &ManagedCertificate) -> Result<()> {
        if let Err(e) = mcrt.spec.validate() {
            warn!("Not provisioning invalid ManagedCertificate {}: {}", key, e);
            return Err(Error::ValidationError(e.to_string()));
        }

        let cert = {
            // resync must not see a created certificate before it is recorded
            let _claim = self.state.claim().await;
            self.provision(key, mcrt, self.state.get(key)).await?
        };

        self.update_status(key, mcrt, &cert).await
    }

    async fn provision(
        &self,
        key: &ResourceKey,
        mcrt: &ManagedCertificate,
        entry: Option<String>,
    ) -> Result<SslCertificate> {
        let (cert_name, created) = match entry {
            None => {
                let cert_name = self.namer.name_for(key);
                self.certificates.create(&cert_name, mcrt).await?;
                self.state.put(key.clone(), cert_name.clone());
                (cert_name, true)
            }
            Some(cert_name) => {
                let missing = !self.certificates.exists(&cert_name, Some(mcrt)).await?;
                if missing {
                    info!("SslCertificate {} for {} is missing, recreating", cert_name, key);
                    self.certificates.create(&cert_name, mcrt).await?;
                }
                (cert_name, missing)
            }
        };

        let cert = if created {
            self.certificates.get_created(&cert_name, mcrt).await?
        } else {
            self.certificates.get(&cert_name, Some(mcrt)).await?
        };
        if same_domains(&mcrt.spec.domains, cert.domains()) {
            Ok(cert)
        } else {
            self.rotate(key, mcrt, &cert_name).await
        }
    }

    /// Replace `old_name` with a certificate covering the current domains
    async fn rotate(
        &self,
        key: &ResourceKey,
        mcrt: &ManagedCertificate,
        old_name: &str,
    ) -> Result<SslCertificate> {
        let new_name = self.namer.name_for(key);
        info!(
            "Domains of {} changed, rotating SslCertificate {} to {}",
            key, old_name, new_name
        );

        self.certificates.create(&new_name, mcrt).await?;
        self.state.put(key.clone(), new_name.clone());

        // no longer referenced, so orphan GC retries if this fails
        if let Err(e) = self.certificates.delete(old_name, Some(mcrt)).await {
            warn!("Failed to delete rotated SslCertificate {}: {}", old_name, e);
        }

        Ok(self.certificates.get_created(&new_name, mcrt).await?)
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        mcrt: &ManagedCertificate,
        cert: &SslCertificate,
    ) -> Result<()> {
        let status = build_status(cert);
        if mcrt.status.as_ref() == Some(&status) {
            debug!("Status of {} unchanged", key);
            return Ok(());
        }
        self.cache.update_status(key, &status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_names_are_prefixed_and_valid() {
        let namer = RandomNamer::new("mcrt-");
        let key = ResourceKey::new("ns", "foo");
        let a = namer.name_for(&key);
        let b = namer.name_for(&key);

        assert_ne!(a, b);
        assert!(a.starts_with("mcrt-"));
        assert_eq!(a.len(), "mcrt-".len() + 32);
        assert!(a.len() <= 63);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_same_domains_ignores_order_and_case() {
        let declared = vec!["b.example.com".to_string(), "A.example.com".to_string()];
        let provisioned = vec!["a.example.com".to_string(), "b.example.com".to_string()];
        assert!(same_domains(&declared, &provisioned));
        assert!(!same_domains(&declared, &provisioned[..1]));
    }

    #[test]
    fn test_tombstone_keeps_identity() {
        let mcrt = tombstone(&ResourceKey::new("ns", "foo"));
        assert_eq!(ResourceKey::from_resource(&mcrt), ResourceKey::new("ns", "foo"));
    }
}

//! Certificate provisioning backend
//!
//! The controller talks to the provisioning backend only through
//! [`SslCertificateApi`]. [`compute::ComputeClient`] implements it against
//! the Compute Engine `sslCertificates` REST API.

pub mod compute;
mod token;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use compute::ComputeClient;
pub use token::{TokenSource, METADATA_TOKEN_URL};

/// Certificate type the controller provisions and garbage-collects
pub const MANAGED_CERTIFICATE_TYPE: &str = "MANAGED";

/// Errors returned by the provisioning backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The named certificate does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The project's SslCertificate quota is exhausted
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other backend or transport failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded(_))
    }
}

/// Snapshot of a provisioned SslCertificate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificate {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedSslCertificate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSslCertificate {
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domain_status: BTreeMap<String, String>,
}

impl SslCertificate {
    /// A managed certificate covering `domains`, as sent on create
    pub fn managed(name: &str, domains: &[String]) -> Self {
        Self {
            name: name.to_string(),
            type_: Some(MANAGED_CERTIFICATE_TYPE.to_string()),
            managed: Some(ManagedSslCertificate {
                domains: domains.to_vec(),
                ..Default::default()
            }),
            expire_time: None,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.type_.as_deref() == Some(MANAGED_CERTIFICATE_TYPE)
    }

    pub fn domains(&self) -> &[String] {
        self.managed
            .as_ref()
            .map(|m| m.domains.as_slice())
            .unwrap_or_default()
    }
}

/// Operations the controller needs from the provisioning backend
#[async_trait]
pub trait SslCertificateApi: Send + Sync {
    /// Create a managed certificate for `domains`
    async fn create(&self, name: &str, domains: &[String]) -> Result<(), ProviderError>;

    /// Delete a certificate; not-found is reported as [`ProviderError::NotFound`]
    async fn delete(&self, name: &str) -> Result<(), ProviderError>;

    /// Fetch a single certificate
    async fn get(&self, name: &str) -> Result<SslCertificate, ProviderError>;

    /// List every certificate in the project
    async fn list(&self) -> Result<Vec<SslCertificate>, ProviderError>;

    /// Whether a certificate exists; absence is not an error
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(ProviderError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_compute_certificate() {
        let json = serde_json::json!({
            "kind": "compute#sslCertificate",
            "name": "mcrt-abc",
            "type": "MANAGED",
            "managed": {
                "domains": ["a.example.com"],
                "status": "PROVISIONING",
                "domainStatus": {"a.example.com": "PROVISIONING"}
            },
            "expireTime": "2027-03-01T10:00:00.000-08:00"
        });
        let cert: SslCertificate = serde_json::from_value(json).unwrap();
        assert!(cert.is_managed());
        assert_eq!(cert.domains(), ["a.example.com".to_string()]);
        assert_eq!(
            cert.managed.unwrap().domain_status["a.example.com"],
            "PROVISIONING"
        );
    }

    #[test]
    fn test_self_managed_certificate_has_no_domains() {
        let cert: SslCertificate =
            serde_json::from_value(serde_json::json!({"name": "legacy", "type": "SELF_MANAGED"}))
                .unwrap();
        assert!(!cert.is_managed());
        assert!(cert.domains().is_empty());
    }
}

//! ManagedCertificate Custom Resource Definition
//!
//! A ManagedCertificate declares the domains a Google-managed SSL
//! certificate must cover. `v1beta2` is the storage version and accepts up
//! to 100 domains.

use kube::CustomResource;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    domains_schema_v1beta2, ManagedCertificateStatus, SpecValidationError, DOMAIN_PATTERN,
    MAX_DOMAINS_V1BETA2, MAX_DOMAIN_LENGTH,
};

static DOMAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DOMAIN_PATTERN).expect("domain pattern is a valid regex"));

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.gke.io",
    version = "v1beta2",
    kind = "ManagedCertificate",
    namespaced,
    status = "ManagedCertificateStatus",
    shortname = "mcrt",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.certificateStatus"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateSpec {
    /// Domains the certificate must be provisioned for
    #[serde(default)]
    #[schemars(schema_with = "domains_schema_v1beta2")]
    pub domains: Vec<String>,
}

impl ManagedCertificateSpec {
    /// Validate the spec against the `v1beta2` schema rules
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        validate_domains(&self.domains, MAX_DOMAINS_V1BETA2)
    }
}

/// Check a domain list against the schema rules enforced by the API server
pub fn validate_domains(domains: &[String], max_domains: usize) -> Result<(), SpecValidationError> {
    if domains.is_empty() {
        return Err(SpecValidationError::new(
            "spec.domains",
            "at least one domain is required",
        ));
    }

    if domains.len() > max_domains {
        return Err(SpecValidationError::new(
            "spec.domains",
            format!(
                "{} domains declared, at most {} allowed",
                domains.len(),
                max_domains
            ),
        ));
    }

    for (i, domain) in domains.iter().enumerate() {
        let field = format!("spec.domains[{i}]");
        if domain.len() > MAX_DOMAIN_LENGTH {
            return Err(SpecValidationError::new(
                field,
                format!("{domain} is longer than {MAX_DOMAIN_LENGTH} characters"),
            ));
        }
        if !DOMAIN_REGEX.is_match(domain) {
            return Err(SpecValidationError::new(
                field,
                format!("{domain} is not a valid DNS name"),
            ));
        }
    }

    Ok(())
}

impl ManagedCertificate {
    /// Certificate name last reported in status, if any
    pub fn status_certificate_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.certificate_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

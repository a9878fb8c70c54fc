//! Legacy `v1beta1` ManagedCertificate, limited to a single domain.
//!
//! Served for existing clients only; objects are stored as `v1beta2`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::managed_certificate::validate_domains;
use super::types::{
    domains_schema_v1beta1, ManagedCertificateStatus, SpecValidationError, MAX_DOMAINS_V1BETA1,
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.gke.io",
    version = "v1beta1",
    kind = "ManagedCertificate",
    namespaced,
    status = "ManagedCertificateStatus",
    shortname = "mcrt"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateSpec {
    #[serde(default)]
    #[schemars(schema_with = "domains_schema_v1beta1")]
    pub domains: Vec<String>,
}

impl ManagedCertificateSpec {
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        validate_domains(&self.domains, MAX_DOMAINS_V1BETA1)
    }
}

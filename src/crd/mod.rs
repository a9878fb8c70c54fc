//! Custom Resource Definitions for managed certificates
//!
//! `ManagedCertificate` is served in two versions: `v1beta1` (one domain)
//! and `v1beta2` (up to 100 domains, storage version). The controller works
//! on `v1beta2` only.

mod managed_certificate;
pub mod types;
pub mod v1beta1;

#[cfg(test)]
mod tests;

use kube::core::crd::{merge_crds, MergeError};
use kube::CustomResourceExt;

pub use managed_certificate::{validate_domains, ManagedCertificate, ManagedCertificateSpec};
pub use types::*;

/// Version objects are persisted in
pub const STORAGE_VERSION: &str = "v1beta2";

/// Full CRD covering every served version
pub fn managed_certificate_crd() -> Result<
    k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    MergeError,
> {
    merge_crds(
        vec![v1beta1::ManagedCertificate::crd(), ManagedCertificate::crd()],
        STORAGE_VERSION,
    )
}

//! Translation of SslCertificate state into ManagedCertificate status

use crate::crd::{DomainStatus, ManagedCertificateStatus};
use crate::provider::SslCertificate;

/// Map a provider certificate status to the ManagedCertificate vocabulary
pub fn translate_certificate_status(status: &str) -> String {
    match status {
        "ACTIVE" => "Active",
        "PROVISIONING" => "Provisioning",
        "PROVISIONING_FAILED" => "ProvisioningFailed",
        "PROVISIONING_FAILED_PERMANENTLY" => "ProvisioningFailedPermanently",
        "RENEWAL_FAILED" => "RenewalFailed",
        other => return camel_case(other),
    }
    .to_string()
}

/// Map a provider domain status to the ManagedCertificate vocabulary
pub fn translate_domain_status(status: &str) -> String {
    match status {
        "ACTIVE" => "Active",
        "PROVISIONING" => "Provisioning",
        "FAILED_NOT_VISIBLE" => "FailedNotVisible",
        "FAILED_CAA_CHECKING" => "FailedCaaChecking",
        "FAILED_CAA_FORBIDDEN" => "FailedCaaForbidden",
        "FAILED_RATE_LIMITED" => "FailedRateLimited",
        other => return camel_case(other),
    }
    .to_string()
}

// SOME_VALUE -> SomeValue
fn camel_case(value: &str) -> String {
    value
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Status to report for a ManagedCertificate backed by `cert`
pub fn build_status(cert: &SslCertificate) -> ManagedCertificateStatus {
    let managed = cert.managed.as_ref();

    let domain_status = managed
        .map(|m| {
            m.domain_status
                .iter()
                .map(|(domain, status)| DomainStatus {
                    domain: domain.clone(),
                    status: translate_domain_status(status),
                })
                .collect()
        })
        .unwrap_or_default();

    ManagedCertificateStatus {
        certificate_status: managed
            .and_then(|m| m.status.as_deref())
            .map(translate_certificate_status),
        domain_status,
        certificate_name: Some(cert.name.clone()),
        expire_time: cert.expire_time.clone(),
    }
}

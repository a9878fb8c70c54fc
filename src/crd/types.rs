//! Shared types for ManagedCertificate CRD versions

use schemars::gen::SchemaGenerator;
use schemars::schema::{
    ArrayValidation, InstanceType, Schema, SchemaObject, SingleOrVec, StringValidation,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pattern every declared domain must match
pub const DOMAIN_PATTERN: &str =
    r"^(([a-zA-Z0-9]+|[a-zA-Z0-9][-a-zA-Z0-9]*[a-zA-Z0-9])\.)+[a-zA-Z][-a-zA-Z0-9]*[a-zA-Z0-9]\.?$";

/// Maximum length of a single domain
pub const MAX_DOMAIN_LENGTH: usize = 63;

/// Maximum number of domains accepted by `v1beta1`
pub const MAX_DOMAINS_V1BETA1: usize = 1;

/// Maximum number of domains accepted by `v1beta2`
pub const MAX_DOMAINS_V1BETA2: usize = 100;

/// Observed state of a ManagedCertificate, written by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateStatus {
    /// Overall certificate status, e.g. "Active" or "Provisioning"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_status: Option<String>,

    /// Per-domain provisioning status
    #[serde(default)]
    pub domain_status: Vec<DomainStatus>,

    /// Name of the provisioned SslCertificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,

    /// Expiry of the provisioned certificate (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainStatus {
    pub domain: String,
    pub status: String,
}

/// Structured validation error for ManagedCertificate specs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecValidationError {
    pub field: String,
    pub message: String,
}

impl SpecValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SpecValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// OpenAPI schema for a `domains` list holding at most `max_items` entries
pub(crate) fn domains_schema(max_items: usize) -> Schema {
    let item = SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        string: Some(Box::new(StringValidation {
            max_length: Some(MAX_DOMAIN_LENGTH as u32),
            min_length: None,
            pattern: Some(DOMAIN_PATTERN.to_string()),
        })),
        ..Default::default()
    };

    SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(SingleOrVec::Single(Box::new(Schema::Object(item)))),
            max_items: Some(max_items as u32),
            ..Default::default()
        })),
        ..Default::default()
    }
    .into()
}

pub(crate) fn domains_schema_v1beta1(_: &mut SchemaGenerator) -> Schema {
    domains_schema(MAX_DOMAINS_V1BETA1)
}

pub(crate) fn domains_schema_v1beta2(_: &mut SchemaGenerator) -> Schema {
    domains_schema(MAX_DOMAINS_V1BETA2)
}

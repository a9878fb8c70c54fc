//! Kubernetes Events attached to ManagedCertificates
//!
//! Event emission is fire-and-forget: failures are logged and never fail
//! the reconcile that produced them.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::{Api, ObjectMeta, PostParams},
    client::Client,
    Resource, ResourceExt,
};
use tracing::warn;

use crate::crd::ManagedCertificate;

/// Component name reported as the event source
pub const EVENT_SOURCE: &str = "managed-certificate-controller";

/// Notifications the controller emits about a ManagedCertificate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateEvent {
    /// An SslCertificate was created for the resource
    Created { certificate: String },
    /// The resource's SslCertificate was deleted
    Deleted { certificate: String },
    /// The SslCertificate quota is exhausted
    TooManyCertificates { error: String },
    /// Any other provisioning backend failure
    BackendError { error: String },
}

impl CertificateEvent {
    pub fn reason(&self) -> &'static str {
        match self {
            CertificateEvent::Created { .. } => "Create",
            CertificateEvent::Deleted { .. } => "Delete",
            CertificateEvent::TooManyCertificates { .. } => "TooManyCertificates",
            CertificateEvent::BackendError { .. } => "BackendError",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            CertificateEvent::Created { .. } | CertificateEvent::Deleted { .. } => "Normal",
            CertificateEvent::TooManyCertificates { .. } | CertificateEvent::BackendError { .. } => {
                "Warning"
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            CertificateEvent::Created { certificate } => {
                format!("Create SslCertificate {certificate}")
            }
            CertificateEvent::Deleted { certificate } => {
                format!("Delete SslCertificate {certificate}")
            }
            CertificateEvent::TooManyCertificates { error } => {
                format!("Too many certificates: {error}")
            }
            CertificateEvent::BackendError { error } => format!("Backend error: {error}"),
        }
    }
}

/// Sink for resource-scoped notifications
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, mcrt: &ManagedCertificate, event: CertificateEvent);
}

/// Writes core/v1 Events through the Kubernetes API
pub struct KubeEventRecorder {
    client: Client,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Build the Event object for `event` on `mcrt`
pub fn build_event(mcrt: &ManagedCertificate, event: &CertificateEvent) -> Event {
    let time = Time(chrono::Utc::now());
    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", mcrt.name_any())),
            namespace: mcrt.namespace(),
            ..Default::default()
        },
        type_: Some(event.event_type().to_string()),
        reason: Some(event.reason().to_string()),
        message: Some(event.message()),
        involved_object: mcrt.object_ref(&()),
        source: Some(k8s_openapi::api::core::v1::EventSource {
            component: Some(EVENT_SOURCE.to_string()),
            host: None,
        }),
        first_timestamp: Some(time.clone()),
        last_timestamp: Some(time),
        count: Some(1),
        ..Default::default()
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, mcrt: &ManagedCertificate, event: CertificateEvent) {
        let namespace = mcrt.namespace().unwrap_or_else(|| "default".to_string());
        let events: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        if let Err(e) = events
            .create(&PostParams::default(), &build_event(mcrt, &event))
            .await
        {
            warn!(
                "Failed to record {} event for {}/{}: {:?}",
                event.reason(),
                namespace,
                mcrt.name_any(),
                e
            );
        }
    }
}

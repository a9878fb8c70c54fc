//! Typed identity of a ManagedCertificate

use std::fmt;

use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use crate::crd::ManagedCertificate;

/// Namespace and name of a ManagedCertificate, built once at the watch boundary
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource(mcrt: &ManagedCertificate) -> Self {
        Self::new(
            mcrt.namespace().unwrap_or_else(|| "default".to_string()),
            mcrt.name_any(),
        )
    }

    /// Reference used to look the object up in the reflector store
    pub fn object_ref(&self) -> ObjectRef<ManagedCertificate> {
        ObjectRef::new(&self.name).within(&self.namespace)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

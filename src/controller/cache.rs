//! Cluster view of ManagedCertificates
//!
//! The watcher keeps a local reflector store in sync with the API server and
//! emits a [`Change`] for every add, update or delete. The controller reads
//! objects only through [`ManagedCertificateCache`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    runtime::{
        reflector::{self, Store},
        watcher, WatchStreamExt,
    },
};
use tracing::{debug, warn};

use super::events::EVENT_SOURCE;
use super::key::ResourceKey;
use crate::crd::{ManagedCertificate, ManagedCertificateStatus};
use crate::error::{Error, Result};

/// A change notification for one ManagedCertificate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Applied(ResourceKey),
    Deleted(ResourceKey),
}

impl Change {
    pub fn into_key(self) -> ResourceKey {
        match self {
            Change::Applied(key) | Change::Deleted(key) => key,
        }
    }
}

/// Read access to declared ManagedCertificates plus status write-back
#[async_trait]
pub trait ManagedCertificateCache: Send + Sync {
    /// Current object for `key`, if it still exists
    fn get(&self, key: &ResourceKey) -> Option<Arc<ManagedCertificate>>;

    /// Every object currently in the cache
    fn list(&self) -> Result<Vec<Arc<ManagedCertificate>>>;

    /// Resolves once the cache holds a complete initial listing
    async fn wait_until_synced(&self) -> Result<()>;

    /// Write `status` to the object's status subresource
    async fn update_status(&self, key: &ResourceKey, status: &ManagedCertificateStatus)
        -> Result<()>;
}

/// Cache backed by a kube-rs reflector store
#[derive(Clone)]
pub struct KubeCache {
    client: Client,
    store: Store<ManagedCertificate>,
}

/// Start watching ManagedCertificates in `namespace` (all namespaces when `None`)
///
/// The returned stream drives the reflector: the cache only fills while the
/// stream is being polled.
pub fn watch(client: Client, namespace: Option<&str>) -> (KubeCache, BoxStream<'static, Change>) {
    let api: Api<ManagedCertificate> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    let (store, writer) = reflector::store();
    let changes = reflector::reflector(writer, watcher(api, watcher::Config::default()).default_backoff())
        .filter_map(|event| async move {
            match event {
                Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                    Some(Change::Applied(ResourceKey::from_resource(&obj)))
                }
                Ok(watcher::Event::Delete(obj)) => {
                    Some(Change::Deleted(ResourceKey::from_resource(&obj)))
                }
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                Err(e) => {
                    warn!("ManagedCertificate watch error: {:?}", e);
                    None
                }
            }
        })
        .boxed();

    (KubeCache { client, store }, changes)
}

#[async_trait]
impl ManagedCertificateCache for KubeCache {
    fn get(&self, key: &ResourceKey) -> Option<Arc<ManagedCertificate>> {
        self.store.get(&key.object_ref())
    }

    fn list(&self) -> Result<Vec<Arc<ManagedCertificate>>> {
        Ok(self.store.state())
    }

    async fn wait_until_synced(&self) -> Result<()> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|e| Error::ConfigError(format!("reflector store dropped: {e}")))
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &ManagedCertificateStatus,
    ) -> Result<()> {
        let api: Api<ManagedCertificate> = Api::namespaced(self.client.clone(), &key.namespace);
        let patch = serde_json::json!({ "status": status });

        api.patch_status(
            &key.name,
            &PatchParams::apply(EVENT_SOURCE),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(Error::KubeError)?;

        debug!("Updated status of ManagedCertificate {}", key);
        Ok(())
    }
}

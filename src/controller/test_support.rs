//! In-memory provider, event sink and cache used by controller tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kube::api::ObjectMeta;
use tokio::sync::Notify;

use super::cache::ManagedCertificateCache;
use super::events::{CertificateEvent, EventRecorder};
use super::key::ResourceKey;
use super::reconciler::CertificateNamer;
use crate::crd::{ManagedCertificate, ManagedCertificateSpec, ManagedCertificateStatus};
use crate::error::{Error, Result};
use crate::provider::{ProviderError, SslCertificate, SslCertificateApi};

pub fn mcrt(namespace: &str, name: &str, domains: &[&str]) -> ManagedCertificate {
    ManagedCertificate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: ManagedCertificateSpec {
            domains: domains.iter().map(|d| d.to_string()).collect(),
        },
        status: None,
    }
}

pub fn with_certificate_name(mut mcrt: ManagedCertificate, cert_name: &str) -> ManagedCertificate {
    mcrt.status = Some(ManagedCertificateStatus {
        certificate_name: Some(cert_name.to_string()),
        ..Default::default()
    });
    mcrt
}

#[derive(Default)]
pub struct FakeProvider {
    certificates: Mutex<BTreeMap<String, SslCertificate>>,
    create_failure: Mutex<Option<ProviderError>>,
    delete_failures: Mutex<HashMap<String, ProviderError>>,
    list_failure: Mutex<Option<ProviderError>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
    lagging_gets: Mutex<HashSet<String>>,
    creates: AtomicUsize,
}

impl FakeProvider {
    /// Provider already holding managed certificates `names` for `example.com`
    pub fn with_certificates(names: &[&str]) -> Self {
        let provider = Self::default();
        for name in names {
            provider.insert(SslCertificate::managed(name, &["example.com".to_string()]));
        }
        provider
    }

    pub fn insert(&self, cert: SslCertificate) {
        self.certificates
            .lock()
            .unwrap()
            .insert(cert.name.clone(), cert);
    }

    /// Fail the next create
    pub fn fail_create(&self, err: ProviderError) {
        *self.create_failure.lock().unwrap() = Some(err);
    }

    /// Fail every delete of `name`
    pub fn fail_delete(&self, name: &str, err: ProviderError) {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(name.to_string(), err);
    }

    pub fn fail_list(&self, err: ProviderError) {
        *self.list_failure.lock().unwrap() = Some(err);
    }

    /// Hold the next list until the returned gate is notified
    pub fn pause_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// The next get of `name` answers not-found, like a pending insert
    pub fn lag_get(&self, name: &str) {
        self.lagging_gets.lock().unwrap().insert(name.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.certificates.lock().unwrap().remove(name);
    }

    pub fn set_status(&self, name: &str, status: &str) {
        if let Some(managed) = self
            .certificates
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(|c| c.managed.as_mut())
        {
            managed.status = Some(status.to_string());
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.certificates.lock().unwrap().keys().cloned().collect()
    }

    pub fn domains_of(&self, name: &str) -> Option<Vec<String>> {
        self.certificates
            .lock()
            .unwrap()
            .get(name)
            .map(|c| c.domains().to_vec())
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SslCertificateApi for FakeProvider {
    async fn create(&self, name: &str, domains: &[String]) -> Result<(), ProviderError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.create_failure.lock().unwrap().take() {
            return Err(err);
        }

        let mut certificates = self.certificates.lock().unwrap();
        if certificates.contains_key(name) {
            return Err(ProviderError::Backend(format!("{name} already exists")));
        }
        let mut cert = SslCertificate::managed(name, domains);
        if let Some(managed) = cert.managed.as_mut() {
            managed.status = Some("PROVISIONING".to_string());
            managed.domain_status = domains
                .iter()
                .map(|d| (d.clone(), "PROVISIONING".to_string()))
                .collect();
        }
        certificates.insert(name.to_string(), cert);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        if let Some(err) = self.delete_failures.lock().unwrap().get(name) {
            return Err(err.clone());
        }
        match self.certificates.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ProviderError::NotFound(name.to_string())),
        }
    }

    async fn get(&self, name: &str) -> Result<SslCertificate, ProviderError> {
        if self.lagging_gets.lock().unwrap().remove(name) {
            return Err(ProviderError::NotFound(name.to_string()));
        }
        self.certificates
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<SslCertificate>, ProviderError> {
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.list_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.certificates.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeEvents {
    recorded: Mutex<Vec<(ResourceKey, CertificateEvent)>>,
    gate: Mutex<Option<(&'static str, Arc<Notify>)>>,
}

impl FakeEvents {
    /// Hold the next event with `reason` until the returned gate is notified
    pub fn pause_on(&self, reason: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some((reason, gate.clone()));
        gate
    }

    pub fn reasons(&self) -> Vec<&'static str> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.reason())
            .collect()
    }

    pub fn recorded(&self) -> Vec<(ResourceKey, CertificateEvent)> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRecorder for FakeEvents {
    async fn record(&self, mcrt: &ManagedCertificate, event: CertificateEvent) {
        let gate = {
            let mut gate = self.gate.lock().unwrap();
            if gate.as_ref().is_some_and(|(reason, _)| *reason == event.reason()) {
                gate.take().map(|(_, g)| g)
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.recorded
            .lock()
            .unwrap()
            .push((ResourceKey::from_resource(mcrt), event));
    }
}

pub struct FakeCache {
    objects: Mutex<BTreeMap<ResourceKey, Arc<ManagedCertificate>>>,
    synced: AtomicBool,
    sync_notify: Notify,
    list_failure: Mutex<Option<String>>,
    status_updates: Mutex<Vec<(ResourceKey, ManagedCertificateStatus)>>,
}

impl Default for FakeCache {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            synced: AtomicBool::new(true),
            sync_notify: Notify::new(),
            list_failure: Mutex::new(None),
            status_updates: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCache {
    pub fn with(resources: Vec<ManagedCertificate>) -> Self {
        let cache = Self::default();
        for mcrt in resources {
            cache.apply(mcrt);
        }
        cache
    }

    /// A cache that only reports synced after [`FakeCache::mark_synced`]
    pub fn unsynced() -> Self {
        let cache = Self::default();
        cache.synced.store(false, Ordering::SeqCst);
        cache
    }

    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
        self.sync_notify.notify_waiters();
    }

    pub fn apply(&self, mcrt: ManagedCertificate) {
        self.objects
            .lock()
            .unwrap()
            .insert(ResourceKey::from_resource(&mcrt), Arc::new(mcrt));
    }

    pub fn remove(&self, key: &ResourceKey) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn fail_list(&self, message: &str) {
        *self.list_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn status_updates(&self) -> Vec<(ResourceKey, ManagedCertificateStatus)> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagedCertificateCache for FakeCache {
    fn get(&self, key: &ResourceKey) -> Option<Arc<ManagedCertificate>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn list(&self) -> Result<Vec<Arc<ManagedCertificate>>> {
        if let Some(message) = self.list_failure.lock().unwrap().clone() {
            return Err(Error::ConfigError(message));
        }
        Ok(self.objects.lock().unwrap().values().cloned().collect())
    }

    async fn wait_until_synced(&self) -> Result<()> {
        loop {
            let notified = self.sync_notify.notified();
            if self.synced.load(Ordering::SeqCst) {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &ManagedCertificateStatus,
    ) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(obj) = objects.get_mut(key) {
            let mut updated = (**obj).clone();
            updated.status = Some(status.clone());
            *obj = Arc::new(updated);
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((key.clone(), status.clone()));
        Ok(())
    }
}

/// `cert-<name>` for the first certificate of a key, `cert-<name>-<n>` after that
#[derive(Default)]
pub struct SequentialNamer {
    issued: Mutex<HashMap<ResourceKey, usize>>,
}

impl CertificateNamer for SequentialNamer {
    fn name_for(&self, key: &ResourceKey) -> String {
        let mut issued = self.issued.lock().unwrap();
        let count = issued.entry(key.clone()).or_insert(0);
        *count += 1;
        match *count {
            1 => format!("cert-{}", key.name),
            n => format!("cert-{}-{}", key.name, n),
        }
    }
}

//! In-memory mapping of ManagedCertificates to the SslCertificates they own
//!
//! The store is the controller's only record of which provider certificates
//! it owns. It is rebuilt from ManagedCertificate status on startup.
//!
//! Creating a certificate and recording it are two steps. Callers that do
//! both hold a [`StateStore::claim`] guard across them; a resync pass holds the
//! [`StateStore::exclusive`] guard while it snapshots ownership and deletes
//! orphans, so it never sees a certificate that exists but is not yet recorded.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use tokio::sync::{RwLock as AsyncRwLock, RwLockReadGuard, RwLockWriteGuard};

use super::key::ResourceKey;

#[derive(Debug, Default)]
pub struct StateStore {
    entries: RwLock<HashMap<ResourceKey, String>>,
    ownership: AsyncRwLock<()>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `key` with the SslCertificate `cert_name`, replacing any previous entry
    pub fn put(&self, key: ResourceKey, cert_name: impl Into<String>) {
        self.write().insert(key, cert_name.into());
    }

    pub fn get(&self, key: &ResourceKey) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn delete(&self, key: &ResourceKey) -> Option<String> {
        self.write().remove(key)
    }

    pub fn all_keys(&self) -> BTreeSet<ResourceKey> {
        self.read().keys().cloned().collect()
    }

    pub fn all_cert_names(&self) -> BTreeSet<String> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Shared guard for a create followed by [`StateStore::put`]
    pub async fn claim(&self) -> RwLockReadGuard<'_, ()> {
        self.ownership.read().await
    }

    /// Exclusive guard; waits for every outstanding claim to finish
    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.ownership.write().await
    }

    // A poisoned lock only means another thread panicked mid-insert; the
    // map itself is still consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ResourceKey, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ResourceKey, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_get_delete() {
        let state = StateStore::new();
        let key = ResourceKey::new("ns", "foo");

        assert_eq!(state.get(&key), None);
        state.put(key.clone(), "cert-foo");
        assert_eq!(state.get(&key).as_deref(), Some("cert-foo"));

        state.put(key.clone(), "cert-foo-2");
        assert_eq!(state.len(), 1);
        assert_eq!(state.get(&key).as_deref(), Some("cert-foo-2"));

        assert_eq!(state.delete(&key).as_deref(), Some("cert-foo-2"));
        assert!(state.is_empty());
    }

    #[test]
    fn test_all_keys_and_cert_names() {
        let state = StateStore::new();
        state.put(ResourceKey::new("ns", "a"), "cert-a");
        state.put(ResourceKey::new("ns", "b"), "cert-b");

        assert_eq!(
            state.all_keys().into_iter().collect::<Vec<_>>(),
            vec![ResourceKey::new("ns", "a"), ResourceKey::new("ns", "b")]
        );
        assert_eq!(
            state.all_cert_names().into_iter().collect::<Vec<_>>(),
            vec!["cert-a".to_string(), "cert-b".to_string()]
        );
    }

    #[test]
    fn test_concurrent_writers() {
        let state = Arc::new(StateStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        state.put(ResourceKey::new("ns", format!("{i}-{j}")), format!("c-{i}-{j}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.len(), 800);
    }

    #[tokio::test]
    async fn test_exclusive_waits_for_claims() {
        let state = Arc::new(StateStore::new());
        let claim = state.claim().await;

        let exclusive = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let _guard = state.exclusive().await;
                state.all_cert_names()
            })
        };
        tokio::task::yield_now().await;
        assert!(!exclusive.is_finished());

        state.put(ResourceKey::new("ns", "foo"), "cert-foo");
        drop(claim);
        assert_eq!(
            exclusive.await.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["cert-foo".to_string()]
        );
    }
}

//! # In-Memory Key Manager
//!
//! A `KeyManagerProvider` backed by a process-local list.
//!
//! Behaves like Barbican where it matters to the reconciler: names are not
//! unique, references are URLs ending in a generated id, and the listing
//! preserves creation order. Every call is appended to an operation log so
//! tests can assert exactly which remote calls a run made. Individual
//! operations can be made to fail to exercise error paths.
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using Arc<RwLock> for concurrent access.

use crate::provider::{KeyManagerProvider, Payload, SecretEntry, SecretRef};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// Operations that can be logged or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Delete,
    Get,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Get => "get",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Operation::Create | Operation::Delete)
    }
}

#[derive(Debug, Clone)]
struct StoredSecret {
    name: Option<String>,
    id: String,
    payload: Payload,
}

/// In-memory key-manager store
#[derive(Debug, Clone)]
pub struct InMemoryKeyManager {
    base_url: String,
    store: Arc<RwLock<Vec<StoredSecret>>>,
    next_id: Arc<AtomicU64>,
    log: Arc<Mutex<Vec<Operation>>>,
    failing: Arc<Mutex<HashSet<Operation>>>,
}

impl Default for InMemoryKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKeyManager {
    pub fn new() -> Self {
        Self::with_base_url("http://key-manager.invalid:9311")
    }

    /// Store whose references are rooted at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            log: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Seed a named secret without going through the trait (not logged)
    pub async fn insert(&self, name: &str, payload: impl Into<Payload>) -> SecretRef {
        self.push(Some(name.to_string()), payload.into()).await
    }

    /// Seed a secret that has no name
    pub async fn insert_unnamed(&self, payload: impl Into<Payload>) -> SecretRef {
        self.push(None, payload.into()).await
    }

    /// Make every future call of `operation` fail
    pub fn fail_on(&self, operation: Operation) {
        self.failing
            .lock()
            .expect("failure set mutex poisoned")
            .insert(operation);
    }

    /// Calls made through the trait so far, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.log.lock().expect("operation log mutex poisoned").clone()
    }

    /// Number of create/delete calls made through the trait
    pub fn mutation_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| op.is_mutation())
            .count()
    }

    /// Payloads of every secret called `name`, in listing order
    pub async fn payloads_named(&self, name: &str) -> Vec<Payload> {
        self.store
            .read()
            .await
            .iter()
            .filter(|s| s.name.as_deref() == Some(name))
            .map(|s| s.payload.clone())
            .collect()
    }

    /// Total number of stored secrets, named or not
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    async fn push(&self, name: Option<String>, payload: Payload) -> SecretRef {
        let id = format!("{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let reference = self.reference_for(&id);
        self.store
            .write()
            .await
            .push(StoredSecret { name, id, payload });
        reference
    }

    fn reference_for(&self, id: &str) -> SecretRef {
        SecretRef::new(format!("{}/v1/secrets/{}", self.base_url, id))
    }

    fn begin(&self, operation: Operation) -> Result<()> {
        self.log
            .lock()
            .expect("operation log mutex poisoned")
            .push(operation);

        let failing = self
            .failing
            .lock()
            .expect("failure set mutex poisoned")
            .contains(&operation);
        if failing {
            anyhow::bail!(
                "HTTP 503 (status: 503 Service Unavailable): injected {} failure",
                operation.as_str()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl KeyManagerProvider for InMemoryKeyManager {
    async fn list_secrets(&self) -> Result<Vec<SecretEntry>> {
        self.begin(Operation::List)?;
        let store = self.store.read().await;
        Ok(store
            .iter()
            .map(|s| SecretEntry {
                name: s.name.clone(),
                reference: self.reference_for(&s.id),
            })
            .collect())
    }

    async fn create_secret(&self, name: &str, payload: &Payload) -> Result<SecretRef> {
        self.begin(Operation::Create)?;
        let reference = self.push(Some(name.to_string()), payload.clone()).await;
        debug!("Stored in-memory secret {} at {}", name, reference);
        Ok(reference)
    }

    async fn delete_secret(&self, reference: &SecretRef) -> Result<()> {
        self.begin(Operation::Delete)?;
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|s| s.id != reference.id());
        if store.len() == before {
            anyhow::bail!("HTTP 404 (status: 404 Not Found): secret {reference} not found");
        }
        Ok(())
    }

    async fn get_secret_payload(&self, reference: &SecretRef) -> Result<Payload> {
        self.begin(Operation::Get)?;
        let store = self.store.read().await;
        store
            .iter()
            .find(|s| s.id == reference.id())
            .map(|s| s.payload.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("HTTP 404 (status: 404 Not Found): secret {reference} not found")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_names_are_kept() {
        let store = InMemoryKeyManager::new();
        store.insert("dup", "one").await;
        store.insert("dup", "two").await;

        let listing = store.list_secrets().await.expect("list");
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|e| e.has_name("dup")));
        assert_eq!(
            store.payloads_named("dup").await,
            vec![Payload::from("one"), Payload::from("two")]
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_reference_fails() {
        let store = InMemoryKeyManager::new();
        let err = store
            .delete_secret(&SecretRef::new("http://key-manager.invalid:9311/v1/secrets/nope"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_injected_failure_and_log() {
        let store = InMemoryKeyManager::new();
        store.fail_on(Operation::Create);

        store.list_secrets().await.expect("list still works");
        assert!(store.create_secret("x", &Payload::from("y")).await.is_err());

        assert_eq!(store.operations(), vec![Operation::List, Operation::Create]);
        assert!(store.is_empty().await);
    }
}

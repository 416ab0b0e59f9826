//! Namespaced secret store interface.
//!
//! The persistent store is an external collaborator; this crate only needs
//! get/put/delete by `(name, namespace)`. [`MemorySecretRepository`] backs
//! tests and single-process deployments.

use async_trait::async_trait;
use connector_core::{ConnectorError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Namespaced key/value store for CA material and issued certificates.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Read a secret. A missing secret is a [`ConnectorError::RepositoryFailure`].
    async fn get(&self, name: &str, namespace: &str) -> Result<Vec<u8>>;

    /// Create or replace a secret.
    async fn put(&self, name: &str, namespace: &str, data: Vec<u8>) -> Result<()>;

    /// Remove a secret. Removing a missing secret succeeds.
    async fn delete(&self, name: &str, namespace: &str) -> Result<()>;
}

/// In-memory [`SecretRepository`].
#[derive(Debug, Default)]
pub struct MemorySecretRepository {
    secrets: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemorySecretRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `namespace/name` is present
    pub async fn contains(&self, name: &str, namespace: &str) -> bool {
        self.secrets
            .read()
            .await
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Number of stored secrets across all namespaces
    pub async fn len(&self) -> usize {
        self.secrets.read().await.len()
    }

    /// Returns true if no secrets are stored
    pub async fn is_empty(&self) -> bool {
        self.secrets.read().await.is_empty()
    }
}

#[async_trait]
impl SecretRepository for MemorySecretRepository {
    async fn get(&self, name: &str, namespace: &str) -> Result<Vec<u8>> {
        self.secrets
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                ConnectorError::RepositoryFailure(format!("secret {namespace}/{name} not found"))
            })
    }

    async fn put(&self, name: &str, namespace: &str, data: Vec<u8>) -> Result<()> {
        debug!(namespace, name, bytes = data.len(), "storing secret");
        self.secrets
            .write()
            .await
            .insert((namespace.to_string(), name.to_string()), data);
        Ok(())
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        self.secrets
            .write()
            .await
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

//! In-memory secret store

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use kvgate_core::DeletedSecret;
use tracing::debug;
use uuid::Uuid;

use crate::store::{SecretStore, SecretValue, StoreError};

/// Endpoint reported for the in-memory backend
pub const MEMORY_ENDPOINT: &str = "memory://local";

/// Days a soft-deleted secret stays recoverable
const RETENTION_DAYS: i64 = 90;

/// A secret with its version history
#[derive(Debug, Clone)]
struct StoredSecret {
    /// Versions in write order (version_id, value)
    versions: Vec<(String, String)>,
    /// Set when the secret is soft-deleted
    deleted_date: Option<DateTime<Utc>>,
}

impl StoredSecret {
    fn current(&self) -> Option<&(String, String)> {
        self.versions.last()
    }
}

/// Secrets held in process memory with vault-like semantics
///
/// Every write creates a new version; deletes are soft and block re-creation
/// of the same name until the secret is purged, as Key Vault does.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    /// Secrets indexed by name
    secrets: DashMap<String, StoredSecret>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self {
            secrets: DashMap::new(),
        }
    }

    /// Permanently remove a soft-deleted secret
    #[cfg(test)]
    fn purge(&self, name: &str) -> Result<(), StoreError> {
        self.secrets
            .remove_if(name, |_, s| s.deleted_date.is_some())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Undo a soft delete, restoring the latest version
    #[cfg(test)]
    fn recover(&self, name: &str) -> Result<(), StoreError> {
        let mut secret = self
            .secrets
            .get_mut(name)
            .filter(|s| s.deleted_date.is_some())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        secret.deleted_date = None;
        Ok(())
    }

    /// Version history of a secret, oldest first
    #[cfg(test)]
    fn versions(&self, name: &str) -> Vec<String> {
        self.secrets
            .get(name)
            .map(|s| s.versions.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    fn endpoint(&self) -> &str {
        MEMORY_ENDPOINT
    }

    async fn get(&self, name: &str) -> Result<SecretValue, StoreError> {
        let secret = self
            .secrets
            .get(name)
            .filter(|s| s.deleted_date.is_none())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let (version, value) = secret
            .current()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        Ok(SecretValue {
            value: value.clone(),
            version: version.clone(),
        })
    }

    async fn set(&self, name: &str, value: &str) -> Result<String, StoreError> {
        let mut secret = self
            .secrets
            .entry(name.to_string())
            .or_insert_with(|| StoredSecret {
                versions: Vec::new(),
                deleted_date: None,
            });

        if secret.deleted_date.is_some() {
            return Err(StoreError::Provider(format!(
                "409 (Conflict): Secret {} is currently in a deleted but recoverable state",
                name
            )));
        }

        let version = Uuid::new_v4().simple().to_string();
        secret.versions.push((version.clone(), value.to_string()));
        debug!(name = %name, version = %version, "Stored secret version");

        Ok(version)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .secrets
            .iter()
            .filter(|r| r.value().deleted_date.is_none())
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<DeletedSecret, StoreError> {
        let mut secret = self
            .secrets
            .get_mut(name)
            .filter(|s| s.deleted_date.is_none())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let now = Utc::now();
        secret.deleted_date = Some(now);

        Ok(DeletedSecret {
            name: name.to_string(),
            recovery_id: Some(format!("{}/deletedsecrets/{}", MEMORY_ENDPOINT, name)),
            scheduled_purge_date: Some(now + Duration::days(RETENTION_DAYS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_secret() {
        let store = InMemorySecretStore::new();

        let version = store.set("db-pw", "s3cr3t").await.unwrap();
        let current = store.get("db-pw").await.unwrap();

        assert_eq!(current.value, "s3cr3t");
        assert_eq!(current.version, version);
    }

    #[tokio::test]
    async fn test_set_creates_new_version() {
        let store = InMemorySecretStore::new();

        let v1 = store.set("my-secret", "value-1").await.unwrap();
        let v2 = store.set("my-secret", "value-2").await.unwrap();
        assert_ne!(v1, v2);

        let current = store.get("my-secret").await.unwrap();
        assert_eq!(current.value, "value-2");
        assert_eq!(store.versions("my-secret"), vec![v1, v2]);
    }

    #[tokio::test]
    async fn test_get_nonexistent_secret_fails() {
        let store = InMemorySecretStore::new();

        let result = store.get("does-not-exist").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_deleted() {
        let store = InMemorySecretStore::new();
        store.set("b", "1").await.unwrap();
        store.set("a", "1").await.unwrap();
        store.set("c", "1").await.unwrap();
        store.delete("c").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_and_blocks_recreate() {
        let store = InMemorySecretStore::new();
        store.set("gone", "1").await.unwrap();

        let deleted = store.delete("gone").await.unwrap();
        assert_eq!(deleted.name, "gone");
        assert!(deleted.scheduled_purge_date.unwrap() > Utc::now() + Duration::days(89));

        assert!(matches!(store.get("gone").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("gone").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.set("gone", "2").await, Err(StoreError::Provider(_))));
    }

    #[tokio::test]
    async fn test_recover_and_purge() {
        let store = InMemorySecretStore::new();
        store.set("keep", "1").await.unwrap();
        store.delete("keep").await.unwrap();
        store.recover("keep").unwrap();
        assert_eq!(store.get("keep").await.unwrap().value, "1");

        store.delete("keep").await.unwrap();
        store.purge("keep").unwrap();
        assert!(store.versions("keep").is_empty());
        store.set("keep", "fresh").await.unwrap();
        assert_eq!(store.get("keep").await.unwrap().value, "fresh");
    }

    #[tokio::test]
    async fn test_purge_requires_deleted_secret() {
        let store = InMemorySecretStore::new();
        store.set("live", "1").await.unwrap();
        assert!(matches!(store.purge("live"), Err(StoreError::NotFound(_))));
    }
}

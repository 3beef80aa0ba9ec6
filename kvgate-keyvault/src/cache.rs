//! Read-through cache in front of a secret store

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kvgate_core::DeletedSecret;
use moka::future::Cache;
use tracing::debug;

use crate::store::{SecretStore, SecretValue, StoreError};

/// Default number of cached secrets
pub const DEFAULT_CACHE_CAPACITY: u64 = 128;

/// Memoizes `get` by secret name
///
/// Writes and deletes invalidate the affected name only. Failed lookups are
/// never cached, and entries have no TTL: a value changed behind the gateway's
/// back stays cached until evicted or rewritten through this store.
///
/// Each name carries a write generation. A lookup only keeps what it fetched
/// if no write to that name started or finished while it was in flight, so a
/// slow read cannot cache a value older than a completed write.
pub struct CachedSecretStore {
    inner: Arc<dyn SecretStore>,
    cache: Cache<String, SecretValue>,
    generations: DashMap<String, u64>,
}

impl CachedSecretStore {
    pub fn new(inner: Arc<dyn SecretStore>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(capacity).build(),
            generations: DashMap::new(),
        }
    }

    fn generation(&self, name: &str) -> u64 {
        self.generations.get(name).map_or(0, |g| *g)
    }

    /// Start or finish a write to `name` and drop its entry
    async fn invalidate(&self, name: &str) {
        *self.generations.entry(name.to_string()).or_insert(0) += 1;
        self.cache.invalidate(name).await;
    }

    #[cfg(test)]
    fn contains(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }
}

#[async_trait]
impl SecretStore for CachedSecretStore {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn get(&self, name: &str) -> Result<SecretValue, StoreError> {
        if let Some(hit) = self.cache.get(name).await {
            debug!(name = %name, "Secret cache hit");
            return Ok(hit);
        }

        let generation = self.generation(name);
        let secret = self.inner.get(name).await?;
        if self.generation(name) != generation {
            debug!(name = %name, "Secret written during lookup, not caching");
            return Ok(secret);
        }

        self.cache.insert(name.to_string(), secret.clone()).await;
        // A write may have bumped between the check and the insert
        if self.generation(name) != generation {
            self.cache.invalidate(name).await;
        }
        Ok(secret)
    }

    async fn set(&self, name: &str, value: &str) -> Result<String, StoreError> {
        self.invalidate(name).await;
        let result = self.inner.set(name, value).await;
        self.invalidate(name).await;
        result
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list().await
    }

    async fn delete(&self, name: &str) -> Result<DeletedSecret, StoreError> {
        self.invalidate(name).await;
        let result = self.inner.delete(name).await;
        self.invalidate(name).await;
        result
    }
}

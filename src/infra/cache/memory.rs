//! In-process TTL cache.
//!
//! Backs the aggregate caches (total received, leaderboard) and the donor
//! name cache. Expired entries are dropped lazily on read and swept by the
//! sync worker on every tick.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::domain::{AuxiliaryError, Cache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe cache keyed by deterministic strings
#[derive(Debug, Default)]
pub struct InMemoryCache {
    store: DashMap<String, Entry>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including ones that expired but were not read since
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AuxiliaryError> {
        let now = Instant::now();
        let hit = self
            .store
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        match hit {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                trace!(key = %key, "Cache entry expired");
                self.store.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), AuxiliaryError> {
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| AuxiliaryError::Cache(format!("ttl {}s out of range", ttl_secs)))?;
        self.store
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), AuxiliaryError> {
        self.store.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, AuxiliaryError> {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| entry.expires_at > now);
        Ok(before.saturating_sub(self.store.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".to_string(), 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".to_string(), 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_del_missing_key_is_ok() {
        let cache = InMemoryCache::new();
        assert!(cache.del("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryCache::new();
        cache.set("old", "1".to_string(), 0).await.unwrap();
        cache.set("fresh", "2".to_string(), 60).await.unwrap();
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }
}

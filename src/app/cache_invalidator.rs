//! Invalidation of the derived donation aggregates.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{AuxiliaryError, Cache};

/// Cache key of the total-received aggregate
pub const TOTAL_CACHE_KEY: &str = "ph:total";

/// Cache key of the donor leaderboard
pub const LEADERBOARD_CACHE_KEY: &str = "ph:leaderboard";

/// Clears the total and leaderboard caches so the next read rebuilds them
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn Cache>,
}

impl CacheInvalidator {
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Delete both aggregate keys. Both deletions are attempted even if the first fails;
    /// the first error is returned.
    #[instrument(skip(self))]
    pub async fn invalidate_aggregates(&self) -> Result<(), AuxiliaryError> {
        info!("Clearing total and leaderboard caches");
        let total = self.cache.del(TOTAL_CACHE_KEY).await;
        let leaderboard = self.cache.del(LEADERBOARD_CACHE_KEY).await;
        total.and(leaderboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryCache;

    #[tokio::test]
    async fn test_invalidate_removes_both_keys() {
        let cache = Arc::new(InMemoryCache::new());
        cache.set(TOTAL_CACHE_KEY, "{}".to_string(), 60).await.unwrap();
        cache.set(LEADERBOARD_CACHE_KEY, "[]".to_string(), 60).await.unwrap();
        cache.set("mydoge:profile:D1", "shibe".to_string(), 60).await.unwrap();

        let invalidator = CacheInvalidator::new(cache.clone());
        invalidator.invalidate_aggregates().await.unwrap();

        assert_eq!(cache.get(TOTAL_CACHE_KEY).await.unwrap(), None);
        assert_eq!(cache.get(LEADERBOARD_CACHE_KEY).await.unwrap(), None);
        assert!(cache.get("mydoge:profile:D1").await.unwrap().is_some());
    }
}

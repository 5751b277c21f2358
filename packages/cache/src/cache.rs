//! Two-tier, epoch-scoped cache.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::key;
use crate::tier::{InMemoryL2, L1Tier, L2Tier};

const DEFAULT_MAX_L1_ENTRIES: usize = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct TieredCache {
    l1: L1Tier,
    l2: Arc<dyn L2Tier>,
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryL2::new()))
    }
}

impl TieredCache {
    pub fn new(l2: Arc<dyn L2Tier>) -> Self {
        Self { l1: L1Tier::new(DEFAULT_MAX_L1_ENTRIES, DEFAULT_TTL), l2 }
    }

    pub fn with_l1_capacity(mut self, max_entries: usize, ttl: Duration) -> Self {
        self.l1 = L1Tier::new(max_entries, ttl);
        self
    }

    /// Read through L1 then L2. An L2 hit is promoted back into L1.
    pub async fn get(&self, prefix: &str, workspace_id: &str, epoch: u64) -> Option<Value> {
        let cache_key = key::build(prefix, workspace_id, epoch);
        if let Some(value) = self.l1.get(&cache_key).await {
            return Some(value);
        }
        let value = self.l2.get(&cache_key).await?;
        self.l1.set(&cache_key, value.clone()).await;
        Some(value)
    }

    /// Write through both tiers. Because the key embeds `epoch`, a
    /// subsequent `get` at the same epoch observes this write
    /// immediately (read-your-writes); a later epoch bump simply
    /// stops matching this key.
    pub async fn set(&self, prefix: &str, workspace_id: &str, epoch: u64, value: Value) {
        let cache_key = key::build(prefix, workspace_id, epoch);
        self.l1.set(&cache_key, value.clone()).await;
        self.l2.set(&cache_key, value).await;
    }

    pub async fn invalidate(&self, prefix: &str, workspace_id: &str, epoch: u64) {
        let cache_key = key::build(prefix, workspace_id, epoch);
        self.l1.invalidate(&cache_key).await;
        self.l2.invalidate(&cache_key).await;
    }

    /// Sweep L1 for TTL-expired entries. Intended to be driven by the
    /// job orchestrator's cache-pruner sweep, every 10 minutes.
    pub async fn prune_l1(&self) -> usize {
        self.l1.prune_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn read_your_writes_within_same_epoch() {
        let cache = TieredCache::default();
        cache.set("perm", "ws-1", 1, json!({"allowed": true})).await;
        assert_eq!(cache.get("perm", "ws-1", 1).await, Some(json!({"allowed": true})));
    }

    #[tokio::test]
    async fn epoch_bump_logically_invalidates_prior_entries() {
        let cache = TieredCache::default();
        cache.set("perm", "ws-1", 1, json!({"allowed": true})).await;
        assert_eq!(cache.get("perm", "ws-1", 2).await, None, "new epoch must miss");
        assert_eq!(cache.get("perm", "ws-1", 1).await, Some(json!({"allowed": true})));
    }

    #[tokio::test]
    async fn l2_hit_is_promoted_into_l1() {
        let l2 = Arc::new(crate::tier::InMemoryL2::new());
        l2.set("perm:ws-1:v1", json!(7)).await;
        let cache = TieredCache::new(l2);

        assert_eq!(cache.get("perm", "ws-1", 1).await, Some(json!(7)));
        let pruned = cache.prune_l1().await;
        assert_eq!(pruned, 0, "fresh promotion should not be expired yet");
    }

    #[tokio::test]
    async fn invalidate_clears_both_tiers() {
        let cache = TieredCache::default();
        cache.set("perm", "ws-1", 1, json!(1)).await;
        cache.invalidate("perm", "ws-1", 1).await;
        assert_eq!(cache.get("perm", "ws-1", 1).await, None);
    }
}

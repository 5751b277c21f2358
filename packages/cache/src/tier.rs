//! Cache tiers: L1 is a bounded, process-local map; L2 is an
//! abstraction over a shared backend (a real deployment would point
//! this at a network cache).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Process-local L1 tier. Bounded by `max_entries`; once full, the
/// oldest entry (by insertion) is evicted to make room.
pub struct L1Tier {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    insertion_order: Arc<RwLock<Vec<String>>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl L1Tier {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            insertion_order: Arc::new(RwLock::new(Vec::new())),
            max_entries,
            default_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let guard = self.entries.read().await;
        let entry = guard.get(key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        let mut order = self.insertion_order.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            if let Some(oldest) = order.first().cloned() {
                entries.remove(&oldest);
                order.remove(0);
            }
        }
        if !entries.contains_key(key) {
            order.push(key.to_string());
        }
        entries.insert(key.to_string(), Entry { value, expires_at: Instant::now() + ttl });
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
        self.insertion_order.write().await.retain(|k| k != key);
    }

    /// Remove every entry past its TTL. Returns the number pruned.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.remove(key);
        }
        drop(entries);

        if !expired.is_empty() {
            let mut order = self.insertion_order.write().await;
            order.retain(|k| !expired.contains(k));
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Shared L2 backend abstraction. A production deployment backs this
/// with a network cache; tests and single-node deployments use
/// `InMemoryL2`.
#[async_trait]
pub trait L2Tier: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value);
    async fn invalidate(&self, key: &str);
}

#[derive(Default)]
pub struct InMemoryL2 {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryL2 {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl L2Tier for InMemoryL2 {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

//! Runs every 10 minutes: sweep the L1 cache tier for TTL-expired
//! entries.

use std::sync::Arc;

use async_trait::async_trait;
use vigil_cache::TieredCache;

use crate::scheduler::{CancelSignal, Sweep};

pub struct CachePrunerSweep {
    cache: Arc<TieredCache>,
}

impl CachePrunerSweep {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Sweep for CachePrunerSweep {
    async fn run(&self, _cancel: &CancelSignal) -> anyhow::Result<()> {
        let pruned = self.cache.prune_l1().await;
        if pruned > 0 {
            tracing::debug!(pruned, "cache pruner swept expired L1 entries");
        }
        Ok(())
    }
}

//! Daily sweep: recompute per-workspace liquidity and cache the result
//! for the compliance layer to read on the next request.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use vigil_cache::TieredCache;

use crate::scheduler::{CancelSignal, Sweep};

const CACHE_PREFIX: &str = "liquidity";

/// Source of truth for account balances. A production deployment
/// backs this with the ledger's reconstructed wallet state; tests
/// supply a stub.
#[async_trait]
pub trait LiquiditySource: Send + Sync {
    async fn workspace_ids(&self) -> Vec<String>;
    async fn total_balance(&self, workspace_id: &str) -> f64;
    async fn cache_epoch(&self, workspace_id: &str) -> u64;
}

pub struct LiquidityAnalyzerSweep {
    source: Arc<dyn LiquiditySource>,
    cache: Arc<TieredCache>,
}

impl LiquidityAnalyzerSweep {
    pub fn new(source: Arc<dyn LiquiditySource>, cache: Arc<TieredCache>) -> Self {
        Self { source, cache }
    }
}

#[async_trait]
impl Sweep for LiquidityAnalyzerSweep {
    async fn run(&self, cancel: &CancelSignal) -> anyhow::Result<()> {
        for workspace_id in self.source.workspace_ids().await {
            if cancel.is_cancelled() {
                break;
            }
            let balance = self.source.total_balance(&workspace_id).await;
            let epoch = self.source.cache_epoch(&workspace_id).await;
            self.cache
                .set(CACHE_PREFIX, &workspace_id, epoch, json!({ "totalBalance": balance }))
                .await;
            tracing::debug!(workspace_id, balance, "liquidity analyzer refreshed balance");
        }
        Ok(())
    }
}

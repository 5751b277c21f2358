//! Runs every 10 minutes: count recent transaction events per
//! workspace and cache the velocity so compliance rules can read it as
//! `metrics.dailyVelocity`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use vigil_cache::TieredCache;
use vigil_ledger::{AuditLedger, EventType, Paging, QueryFilters};

use crate::scheduler::{CancelSignal, Sweep};

const CACHE_PREFIX: &str = "velocity";
const VELOCITY_WINDOW_HOURS: i64 = 24;

pub struct VelocityCalculatorSweep {
    ledger: Arc<AuditLedger>,
    cache: Arc<TieredCache>,
    tracked_workspaces: Vec<(String, u64)>,
}

impl VelocityCalculatorSweep {
    pub fn new(ledger: Arc<AuditLedger>, cache: Arc<TieredCache>, tracked_workspaces: Vec<(String, u64)>) -> Self {
        Self { ledger, cache, tracked_workspaces }
    }
}

#[async_trait]
impl Sweep for VelocityCalculatorSweep {
    async fn run(&self, cancel: &CancelSignal) -> anyhow::Result<()> {
        let since = Utc::now() - Duration::hours(VELOCITY_WINDOW_HOURS);

        for (workspace_id, epoch) in &self.tracked_workspaces {
            if cancel.is_cancelled() {
                break;
            }
            let filters = QueryFilters {
                entity_id: Some(workspace_id.clone()),
                performed_by: None,
                event_type: Some(EventType::Created),
                since: Some(since),
                until: None,
            };
            let entries = self.ledger.query(&filters, Paging::default()).await;
            let velocity = entries.len() as u64;

            self.cache
                .set(CACHE_PREFIX, workspace_id, *epoch, json!({ "dailyVelocity": velocity }))
                .await;
            tracing::debug!(workspace_id, velocity, "velocity calculator refreshed metric");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json as j;

    #[tokio::test]
    async fn counts_created_events_within_window() {
        let ledger = Arc::new(AuditLedger::new(b"key".to_vec()));
        for _ in 0..3 {
            ledger
                .append("ws-1", "Transaction", EventType::Created, j!({}), "system")
                .await
                .unwrap();
        }
        let cache = Arc::new(TieredCache::default());
        let sweep = VelocityCalculatorSweep::new(ledger, cache.clone(), vec![("ws-1".to_string(), 1)]);

        sweep.run(&CancelSignal::new()).await.unwrap();

        let cached = cache.get(CACHE_PREFIX, "ws-1", 1).await.unwrap();
        assert_eq!(cached["dailyVelocity"], 3);
    }
}

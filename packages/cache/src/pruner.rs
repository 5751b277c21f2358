//! Standalone 10-minute L1 pruning loop, for deployments that don't
//! drive pruning from the job orchestrator's cache-pruner sweep.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TieredCache;

pub const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

pub async fn run(cache: Arc<TieredCache>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let pruned = cache.prune_l1().await;
                if pruned > 0 {
                    tracing::debug!(pruned, "cache pruner swept expired L1 entries");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn shutdown_signal_stops_the_loop() {
        let cache = Arc::new(
            TieredCache::default().with_l1_capacity(10, Duration::from_millis(1)),
        );
        cache.set("perm", "ws-1", 1, json!(1)).await;

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(run(cache.clone(), rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pruner loop should exit promptly on shutdown")
            .unwrap();
    }
}

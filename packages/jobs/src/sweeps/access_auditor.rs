//! Nightly sweep: re-verify every tracked entity's ledger chain and
//! surface breaks as governance findings.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use vigil_ledger::AuditLedger;

use crate::scheduler::{CancelSignal, Sweep};

pub struct AccessAuditorSweep {
    ledger: Arc<AuditLedger>,
    tracked_entities: Arc<RwLock<HashSet<String>>>,
}

impl AccessAuditorSweep {
    pub fn new(ledger: Arc<AuditLedger>) -> Self {
        Self { ledger, tracked_entities: Arc::new(RwLock::new(HashSet::new())) }
    }

    pub async fn track(&self, entity_id: impl Into<String>) {
        self.tracked_entities.write().await.insert(entity_id.into());
    }
}

#[async_trait]
impl Sweep for AccessAuditorSweep {
    async fn run(&self, cancel: &CancelSignal) -> anyhow::Result<()> {
        let entities: Vec<String> = self.tracked_entities.read().await.iter().cloned().collect();
        let mut violations = 0usize;

        for entity_id in entities {
            if cancel.is_cancelled() {
                break;
            }
            let verification = self.ledger.audit_chain(&entity_id).await;
            if !verification.valid {
                violations += 1;
                tracing::error!(
                    entity_id,
                    broken_at = verification.broken_at,
                    reason = verification.reason.as_deref().unwrap_or("unknown"),
                    "access auditor found a broken chain"
                );
            }
        }

        if violations > 0 {
            tracing::warn!(violations, "access auditor sweep completed with findings");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn clean_chain_produces_no_violation() {
        let ledger = Arc::new(AuditLedger::new(b"key".to_vec()));
        ledger
            .append("wallet-1", "Wallet", vigil_ledger::EventType::Created, json!({}), "system")
            .await
            .unwrap();

        let sweep = AccessAuditorSweep::new(ledger);
        sweep.track("wallet-1").await;

        assert!(sweep.run(&CancelSignal::new()).await.is_ok());
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_early() {
        let ledger = Arc::new(AuditLedger::new(b"key".to_vec()));
        let sweep = AccessAuditorSweep::new(ledger);
        sweep.track("wallet-1").await;
        sweep.track("wallet-2").await;

        let cancel = CancelSignal::new();
        cancel.cancel();
        assert!(sweep.run(&cancel).await.is_ok());
    }
}

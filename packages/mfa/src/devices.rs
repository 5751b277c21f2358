//! Trusted device registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::types::TrustedDevice;

const TRUST_GRANT: Duration = Duration::days(30);

pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<(String, String), TrustedDevice>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, principal_id: &str, fingerprint: &str) -> Option<TrustedDevice> {
        self.devices
            .read()
            .await
            .get(&(principal_id.to_string(), fingerprint.to_string()))
            .cloned()
    }

    /// Observe a login from this device, creating a record on first
    /// sight. `verified` grants/extends the trust window.
    pub async fn observe(
        &self,
        principal_id: &str,
        device_id: &str,
        fingerprint: &str,
        verified: bool,
        now: DateTime<Utc>,
    ) -> TrustedDevice {
        let mut guard = self.devices.write().await;
        let key = (principal_id.to_string(), fingerprint.to_string());
        let entry = guard.entry(key).or_insert_with(|| TrustedDevice {
            principal_id: principal_id.to_string(),
            device_id: device_id.to_string(),
            fingerprint: fingerprint.to_string(),
            verified: false,
            trust_expires_at: None,
            compromised: false,
            last_used_at: now,
            usage_count: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
            first_seen_at: now,
        });

        entry.last_used_at = now;
        entry.usage_count += 1;
        entry.consecutive_successes += 1;
        entry.consecutive_failures = 0;
        if verified {
            entry.verified = true;
            entry.trust_expires_at = Some(now + TRUST_GRANT);
        }
        entry.clone()
    }

    pub async fn record_failure(&self, principal_id: &str, fingerprint: &str) {
        let mut guard = self.devices.write().await;
        if let Some(entry) = guard.get_mut(&(principal_id.to_string(), fingerprint.to_string())) {
            entry.consecutive_successes = 0;
            entry.consecutive_failures += 1;
        }
    }

    pub async fn mark_compromised(&self, principal_id: &str, fingerprint: &str) {
        let mut guard = self.devices.write().await;
        if let Some(entry) = guard.get_mut(&(principal_id.to_string(), fingerprint.to_string())) {
            entry.compromised = true;
            entry.verified = false;
            entry.trust_expires_at = None;
        }
    }
}

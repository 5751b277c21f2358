//! Adaptive MFA: core types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk tier produced by confidence scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Enrolled verification methods, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMethod {
    Push,
    Biometric,
    WebAuthn,
    Totp,
    Knowledge,
}

/// Per-principal MFA lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MfaState {
    None,
    SetupPending,
    Enabled,
    Locked,
    Disabled,
}

impl MfaState {
    /// Whether `next` is a legal transition from `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use MfaState::*;
        matches!(
            (self, next),
            (None, SetupPending)
                | (SetupPending, Enabled)
                | (Enabled, Locked)
                | (Locked, Enabled)
                | (Enabled, Disabled)
                | (Locked, Disabled)
                | (Disabled, SetupPending)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCode {
    pub code_hash: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

/// A device previously seen for a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedDevice {
    pub principal_id: String,
    pub device_id: String,
    pub fingerprint: String,
    pub verified: bool,
    pub trust_expires_at: Option<DateTime<Utc>>,
    pub compromised: bool,
    pub last_used_at: DateTime<Utc>,
    pub usage_count: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub first_seen_at: DateTime<Utc>,
}

impl TrustedDevice {
    /// A device can skip the 2FA challenge only when trusted, unexpired,
    /// and never flagged compromised.
    pub fn skip_2fa(&self, now: DateTime<Utc>) -> bool {
        if self.compromised || !self.verified {
            return false;
        }
        match self.trust_expires_at {
            Some(expiry) => now < expiry,
            None => false,
        }
    }
}

/// Record of a successful challenge, used to grant short-lived bypasses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSuccess {
    pub principal_id: String,
    pub device_fingerprint: String,
    pub risk_level: RiskLevel,
    pub ip: Option<String>,
    pub at: DateTime<Utc>,
}

/// Per-principal MFA configuration and adaptive state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    pub principal_id: String,
    pub state: MfaState,
    pub enabled_methods: Vec<ChallengeMethod>,
    pub primary_method: Option<ChallengeMethod>,
    pub backup_codes: Vec<BackupCode>,
    pub failure_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl TwoFactorConfig {
    pub fn new(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            state: MfaState::None,
            enabled_methods: Vec::new(),
            primary_method: None,
            backup_codes: Vec::new(),
            failure_count: 0,
            locked_until: None,
        }
    }

    pub fn has_method(&self, method: ChallengeMethod) -> bool {
        self.enabled_methods.contains(&method)
    }
}

/// Inputs the confidence scorer needs about a principal's recent history.
#[derive(Debug, Clone, Default)]
pub struct RiskSignals {
    pub device_usage_count: u32,
    pub device_first_seen_days_ago: u32,
    pub device_seen_before: bool,
    pub country_login_frequency: f64,
    pub hour_login_frequency: f64,
    pub successful_logins_last_24h: u32,
    pub suspicious_signal_count: u32,
    pub account_age_days: u32,
    pub recent_failed_attempts: u32,
}

/// A verified session's drift-tracking anchor.
#[derive(Debug, Clone)]
pub struct SessionAnchor {
    pub principal_id: String,
    pub ip: Option<String>,
    pub user_agent_family: Option<String>,
    pub verified_2fa: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MfaMetrics {
    pub challenges_issued: u64,
    pub challenges_succeeded: u64,
    pub challenges_failed: u64,
    pub lockouts: u64,
    pub bypasses_granted: u64,
    pub session_drift_events: u64,
    pub method_usage: HashMap<ChallengeMethod, u64>,
}

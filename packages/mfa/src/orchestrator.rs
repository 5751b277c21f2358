//! Adaptive MFA Orchestrator: ties risk scoring, challenge selection,
//! lockouts, trusted devices, and the per-principal state machine
//! together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vigil_core::GovernanceError;

use crate::backup_codes;
use crate::challenge::{self, bypass_applies};
use crate::devices::DeviceRegistry;
use crate::lockout::{AttemptOutcome, LockoutTracker};
use crate::scoring::{confidence_score, risk_level};
use crate::types::{
    ChallengeMethod, ChallengeSuccess, MfaMetrics, MfaState, RiskLevel, RiskSignals,
    SessionAnchor, TwoFactorConfig,
};

pub struct RiskDecision {
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

pub struct MfaOrchestrator {
    configs: Arc<RwLock<HashMap<String, TwoFactorConfig>>>,
    devices: DeviceRegistry,
    lockouts: LockoutTracker,
    challenge_successes: Arc<RwLock<HashMap<String, ChallengeSuccess>>>,
    sessions: Arc<RwLock<HashMap<String, SessionAnchor>>>,
    metrics: Arc<RwLock<MfaMetrics>>,
}

impl Default for MfaOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl MfaOrchestrator {
    pub fn new() -> Self {
        Self {
            configs: Arc::new(RwLock::new(HashMap::new())),
            devices: DeviceRegistry::new(),
            lockouts: LockoutTracker::new(),
            challenge_successes: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(RwLock::new(MfaMetrics::default())),
        }
    }

    pub async fn config(&self, principal_id: &str) -> Option<TwoFactorConfig> {
        self.configs.read().await.get(principal_id).cloned()
    }

    pub async fn metrics(&self) -> MfaMetrics {
        self.metrics.read().await.clone()
    }

    /// `NONE -> SETUP_PENDING`, or `DISABLED -> SETUP_PENDING` to
    /// re-enroll a principal who previously disabled MFA.
    pub async fn begin_enrollment(&self, principal_id: &str) -> Result<(), GovernanceError> {
        let mut guard = self.configs.write().await;
        let config = guard
            .entry(principal_id.to_string())
            .or_insert_with(|| TwoFactorConfig::new(principal_id));
        transition(config, MfaState::SetupPending)
    }

    /// `SETUP_PENDING -> ENABLED`. Returns the plaintext backup codes,
    /// which must be shown to the principal exactly once. Resets
    /// `backup_codes`, `failure_count`, and `locked_until`, so
    /// re-enrolling after a disable starts with a clean slate.
    pub async fn complete_enrollment(
        &self,
        principal_id: &str,
        methods: Vec<ChallengeMethod>,
        primary: ChallengeMethod,
    ) -> Result<Vec<String>, GovernanceError> {
        let mut guard = self.configs.write().await;
        let config = guard
            .get_mut(principal_id)
            .ok_or_else(|| GovernanceError::NotFound { what: format!("mfa config for {principal_id}") })?;
        transition(config, MfaState::Enabled)?;
        config.enabled_methods = methods;
        config.primary_method = Some(primary);
        let (plaintext, hashed) = backup_codes::generate();
        config.backup_codes = hashed;
        config.failure_count = 0;
        config.locked_until = None;
        Ok(plaintext)
    }

    /// `ENABLED/LOCKED -> DISABLED`. Always a critical-severity event.
    pub async fn disable(&self, principal_id: &str) -> Result<(), GovernanceError> {
        let mut guard = self.configs.write().await;
        let config = guard
            .get_mut(principal_id)
            .ok_or_else(|| GovernanceError::NotFound { what: format!("mfa config for {principal_id}") })?;
        transition(config, MfaState::Disabled)?;
        tracing::warn!(principal_id, "mfa disabled; notifying all enabled channels");
        Ok(())
    }

    pub fn evaluate_risk(&self, signals: &RiskSignals) -> RiskDecision {
        let confidence = confidence_score(signals);
        RiskDecision { confidence, risk_level: risk_level(confidence) }
    }

    /// Observe the login device and decide whether a challenge is
    /// required at all, returning `None` when the device itself may
    /// skip 2FA or a prior challenge success still covers it.
    pub async fn needs_challenge(
        &self,
        principal_id: &str,
        device_id: &str,
        fingerprint: &str,
        risk: RiskLevel,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let device = self.devices.observe(principal_id, device_id, fingerprint, false, now).await;
        if device.skip_2fa(now) {
            return false;
        }
        let successes = self.challenge_successes.read().await;
        if let Some(success) = successes.get(principal_id) {
            if bypass_applies(success, fingerprint, risk, ip, now) {
                let mut metrics = self.metrics.write().await;
                metrics.bypasses_granted += 1;
                return false;
            }
        }
        true
    }

    /// Select a challenge method for `principal_id` at the given risk
    /// tier, failing if the account is currently locked.
    pub async fn request_challenge(
        &self,
        principal_id: &str,
        risk: RiskLevel,
        now: DateTime<Utc>,
    ) -> Result<ChallengeMethod, GovernanceError> {
        let guard = self.configs.read().await;
        let config = guard
            .get(principal_id)
            .ok_or_else(|| GovernanceError::NotFound { what: format!("mfa config for {principal_id}") })?;

        if let Some(locked_until) = config.locked_until {
            if now < locked_until {
                return Err(GovernanceError::LockedOut {
                    retry_after_secs: (locked_until - now).num_seconds().max(0),
                });
            }
        }

        challenge::select_challenge(config, risk).ok_or_else(|| {
            GovernanceError::ValidationFailed(format!("no enrolled method for principal {principal_id}"))
        })
    }

    /// Record a challenge attempt outcome, updating the lockout window
    /// and (on success) the bypass cache and device trust.
    pub async fn record_challenge_result(
        &self,
        principal_id: &str,
        device_id: &str,
        fingerprint: &str,
        method: ChallengeMethod,
        risk: RiskLevel,
        succeeded: bool,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), GovernanceError> {
        let mut metrics = self.metrics.write().await;
        if succeeded {
            metrics.challenges_succeeded += 1;
            *metrics.method_usage.entry(method).or_insert(0) += 1;
        } else {
            metrics.challenges_failed += 1;
        }
        drop(metrics);

        if succeeded {
            self.lockouts.record_success(principal_id, method).await;
            self.devices.observe(principal_id, device_id, fingerprint, true, now).await;
            self.challenge_successes.write().await.insert(
                principal_id.to_string(),
                ChallengeSuccess {
                    principal_id: principal_id.to_string(),
                    device_fingerprint: fingerprint.to_string(),
                    risk_level: risk,
                    ip: ip.map(str::to_string),
                    at: now,
                },
            );

            let mut guard = self.configs.write().await;
            if let Some(config) = guard.get_mut(principal_id) {
                config.failure_count = 0;
                if config.state == MfaState::Locked {
                    transition(config, MfaState::Enabled)?;
                }
                config.locked_until = None;
            }
            return Ok(());
        }

        self.devices.record_failure(principal_id, fingerprint).await;
        let outcome = self.lockouts.record_failure(principal_id, method, now).await;

        let mut guard = self.configs.write().await;
        if let Some(config) = guard.get_mut(principal_id) {
            config.failure_count += 1;
            if let AttemptOutcome::Locked { until } = outcome {
                config.locked_until = Some(until);
                transition(config, MfaState::Locked)?;
                drop(guard);
                self.metrics.write().await.lockouts += 1;
                return Err(GovernanceError::LockedOut {
                    retry_after_secs: (until - now).num_seconds().max(0),
                });
            }
        }

        Ok(())
    }

    pub async fn verify_backup_code(
        &self,
        principal_id: &str,
        code: &str,
    ) -> Result<bool, GovernanceError> {
        let mut guard = self.configs.write().await;
        let config = guard
            .get_mut(principal_id)
            .ok_or_else(|| GovernanceError::NotFound { what: format!("mfa config for {principal_id}") })?;
        Ok(backup_codes::consume(&mut config.backup_codes, code))
    }

    /// Register or update the verified-2FA anchor for a session.
    pub async fn anchor_session(
        &self,
        session_id: &str,
        principal_id: &str,
        ip: Option<String>,
        user_agent_family: Option<String>,
    ) {
        self.sessions.write().await.insert(
            session_id.to_string(),
            SessionAnchor { principal_id: principal_id.to_string(), ip, user_agent_family, verified_2fa: true },
        );
    }

    /// If the session's IP or (principal, userAgent) family has
    /// drifted since anchoring, clear `verified2FA` and report that a
    /// re-challenge is required.
    pub async fn check_session_drift(
        &self,
        session_id: &str,
        current_ip: Option<&str>,
        current_user_agent_family: Option<&str>,
    ) -> bool {
        let mut guard = self.sessions.write().await;
        let Some(anchor) = guard.get_mut(session_id) else {
            return false;
        };
        if !anchor.verified_2fa {
            return false;
        }

        let ip_drifted = match (&anchor.ip, current_ip) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        let ua_drifted = match (&anchor.user_agent_family, current_user_agent_family) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };

        if ip_drifted || ua_drifted {
            anchor.verified_2fa = false;
            tracing::warn!(session_id, ip_drifted, ua_drifted, "session drift detected; 2FA cleared");
            drop(guard);
            self.metrics.write().await.session_drift_events += 1;
            true
        } else {
            false
        }
    }
}

fn transition(config: &mut TwoFactorConfig, next: MfaState) -> Result<(), GovernanceError> {
    if !config.state.can_transition_to(next) {
        return Err(GovernanceError::ValidationFailed(format!(
            "illegal mfa transition {:?} -> {:?}",
            config.state, next
        )));
    }
    config.state = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enrollment_round_trip_enables_methods() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator.begin_enrollment("p1").await.unwrap();
        let codes = orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();
        assert_eq!(codes.len(), 10);
        let config = orchestrator.config("p1").await.unwrap();
        assert_eq!(config.state, MfaState::Enabled);
    }

    #[tokio::test]
    async fn fourth_failed_challenge_locks_account() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator.begin_enrollment("p1").await.unwrap();
        orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();

        let now = Utc::now();
        for _ in 0..3 {
            orchestrator
                .record_challenge_result("p1", "d1", "fp1", ChallengeMethod::Totp, RiskLevel::High, false, None, now)
                .await
                .unwrap();
        }
        let result = orchestrator
            .record_challenge_result("p1", "d1", "fp1", ChallengeMethod::Totp, RiskLevel::High, false, None, now)
            .await;
        assert!(matches!(result, Err(GovernanceError::LockedOut { .. })));

        let config = orchestrator.config("p1").await.unwrap();
        assert_eq!(config.state, MfaState::Locked);
    }

    #[tokio::test]
    async fn successful_challenge_clears_lock_state() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator.begin_enrollment("p1").await.unwrap();
        orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();

        let now = Utc::now();
        orchestrator
            .record_challenge_result("p1", "d1", "fp1", ChallengeMethod::Totp, RiskLevel::Medium, true, Some("1.1.1.1"), now)
            .await
            .unwrap();

        let config = orchestrator.config("p1").await.unwrap();
        assert_eq!(config.failure_count, 0);
    }

    #[tokio::test]
    async fn session_drift_clears_verified_flag() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator
            .anchor_session("sess-1", "p1", Some("1.1.1.1".to_string()), Some("chrome".to_string()))
            .await;

        let drifted = orchestrator
            .check_session_drift("sess-1", Some("9.9.9.9"), Some("chrome"))
            .await;
        assert!(drifted);

        let drifted_again = orchestrator
            .check_session_drift("sess-1", Some("9.9.9.9"), Some("chrome"))
            .await;
        assert!(!drifted_again, "already cleared, should not re-fire");
    }

    #[tokio::test]
    async fn disabling_and_re_enrolling_resets_counters_and_codes() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator.begin_enrollment("p1").await.unwrap();
        let first_codes = orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();

        let now = Utc::now();
        for _ in 0..4 {
            let _ = orchestrator
                .record_challenge_result("p1", "d1", "fp1", ChallengeMethod::Totp, RiskLevel::High, false, None, now)
                .await;
        }
        let locked = orchestrator.config("p1").await.unwrap();
        assert_eq!(locked.state, MfaState::Locked);
        assert!(locked.locked_until.is_some());

        orchestrator.disable("p1").await.unwrap();
        let disabled = orchestrator.config("p1").await.unwrap();
        assert_eq!(disabled.state, MfaState::Disabled);

        orchestrator.begin_enrollment("p1").await.unwrap();
        let second_codes = orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();

        let re_enabled = orchestrator.config("p1").await.unwrap();
        assert_eq!(re_enabled.state, MfaState::Enabled);
        assert_eq!(re_enabled.failure_count, 0);
        assert!(re_enabled.locked_until.is_none());
        assert_ne!(first_codes, second_codes);
    }

    #[tokio::test]
    async fn backup_code_is_single_use() {
        let orchestrator = MfaOrchestrator::new();
        orchestrator.begin_enrollment("p1").await.unwrap();
        let codes = orchestrator
            .complete_enrollment("p1", vec![ChallengeMethod::Totp], ChallengeMethod::Totp)
            .await
            .unwrap();

        assert!(orchestrator.verify_backup_code("p1", &codes[0]).await.unwrap());
        assert!(!orchestrator.verify_backup_code("p1", &codes[0]).await.unwrap());
    }
}

//! Challenge method selection and success-bypass cooldowns.

use chrono::{DateTime, Duration, Utc};

use crate::types::{ChallengeMethod, ChallengeSuccess, RiskLevel, TwoFactorConfig};

/// Ranked candidate lists per risk tier, before the enrollment mask.
fn preference_order(risk: RiskLevel) -> &'static [ChallengeMethod] {
    use ChallengeMethod::*;
    match risk {
        RiskLevel::Low => &[Push, Biometric, WebAuthn, Totp],
        RiskLevel::Medium => &[WebAuthn, Push, Totp],
        RiskLevel::High => &[Knowledge, Totp],
    }
}

/// Pick the best enrolled method for the given risk tier, or `None` if
/// the principal has no usable method enrolled.
pub fn select_challenge(config: &TwoFactorConfig, risk: RiskLevel) -> Option<ChallengeMethod> {
    preference_order(risk)
        .iter()
        .copied()
        .find(|method| config.has_method(*method))
}

fn bypass_window(risk: RiskLevel) -> Duration {
    match risk {
        RiskLevel::Low => Duration::hours(24),
        RiskLevel::Medium => Duration::hours(1),
        RiskLevel::High => Duration::minutes(5),
    }
}

/// Whether a prior `challengeSuccess` still covers `(principal, device)`
/// at `risk` and `now`, honoring the session-drift IP check.
pub fn bypass_applies(
    success: &ChallengeSuccess,
    device_fingerprint: &str,
    risk: RiskLevel,
    current_ip: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if success.device_fingerprint != device_fingerprint {
        return false;
    }
    if let (Some(original), Some(current)) = (&success.ip, current_ip) {
        if original != current {
            return false;
        }
    }
    now - success.at < bypass_window(risk)
}

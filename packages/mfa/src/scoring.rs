//! Confidence scoring: a weighted sum of six factor evaluators.

use crate::types::{RiskLevel, RiskSignals};

const WEIGHT_DEVICE: f64 = 0.25;
const WEIGHT_LOCATION: f64 = 0.20;
const WEIGHT_TIME: f64 = 0.15;
const WEIGHT_ACTIVITY: f64 = 0.15;
const WEIGHT_ACCOUNT_AGE: f64 = 0.10;
const WEIGHT_FAILED_ATTEMPTS: f64 = 0.15;

fn device_trust(signals: &RiskSignals) -> f64 {
    if !signals.device_seen_before {
        return 0.0;
    }
    if signals.device_usage_count >= 10 && signals.device_first_seen_days_ago >= 30 {
        0.9
    } else {
        0.4
    }
}

fn location_trust(signals: &RiskSignals) -> f64 {
    signals.country_login_frequency.clamp(0.0, 1.0)
}

fn time_trust(signals: &RiskSignals) -> f64 {
    signals.hour_login_frequency.clamp(0.0, 1.0)
}

fn activity_trust(signals: &RiskSignals) -> f64 {
    let base = (signals.successful_logins_last_24h as f64 / 5.0).min(1.0);
    let penalty = (signals.suspicious_signal_count as f64 * 0.2).min(1.0);
    (base - penalty).max(0.0)
}

fn account_age_trust(signals: &RiskSignals) -> f64 {
    match signals.account_age_days {
        0 => 0.2,
        1..=6 => 0.4,
        7..=29 => 0.6,
        _ => 0.9,
    }
}

fn failed_attempts_trust(signals: &RiskSignals) -> f64 {
    (1.0 - signals.recent_failed_attempts as f64 * 0.25).max(0.0)
}

/// Scalar confidence in [0, 1]; higher means more trustworthy.
pub fn confidence_score(signals: &RiskSignals) -> f64 {
    let score = device_trust(signals) * WEIGHT_DEVICE
        + location_trust(signals) * WEIGHT_LOCATION
        + time_trust(signals) * WEIGHT_TIME
        + activity_trust(signals) * WEIGHT_ACTIVITY
        + account_age_trust(signals) * WEIGHT_ACCOUNT_AGE
        + failed_attempts_trust(signals) * WEIGHT_FAILED_ATTEMPTS;
    score.clamp(0.0, 1.0)
}

/// HIGH confidence (>= 0.8) maps to LOW risk; MEDIUM (>= 0.5) to MEDIUM
/// risk; anything lower is HIGH risk.
pub fn risk_level(confidence: f64) -> RiskLevel {
    if confidence >= 0.8 {
        RiskLevel::Low
    } else if confidence >= 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

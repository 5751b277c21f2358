//! Per-method retry tracking and lockout within a 15-minute sliding window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::types::ChallengeMethod;

const WINDOW: Duration = Duration::minutes(15);
const COOLDOWN: Duration = Duration::minutes(5);
const LOCK: Duration = Duration::minutes(15);

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// First failure in the window: surfaced as a warning only.
    Warn,
    /// Second failure: retry allowed, hint an alternative method.
    RetryAllowed,
    /// Third failure: short cooldown before another attempt.
    Cooldown { until: DateTime<Utc> },
    /// Fourth or later failure: the account is locked.
    Locked { until: DateTime<Utc> },
}

#[derive(Default)]
struct Key {
    failures: Vec<DateTime<Utc>>,
}

/// Tracks failed-challenge attempts per `(principal, method)`.
pub struct LockoutTracker {
    state: Arc<RwLock<HashMap<(String, ChallengeMethod), Key>>>,
}

impl Default for LockoutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LockoutTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a failed attempt and return the outcome for this attempt
    /// number within the current sliding window.
    pub async fn record_failure(
        &self,
        principal_id: &str,
        method: ChallengeMethod,
        now: DateTime<Utc>,
    ) -> AttemptOutcome {
        let mut guard = self.state.write().await;
        let key = guard
            .entry((principal_id.to_string(), method))
            .or_default();
        key.failures.retain(|t| now - *t < WINDOW);
        key.failures.push(now);
        let count = key.failures.len();

        match count {
            1 => AttemptOutcome::Warn,
            2 => AttemptOutcome::RetryAllowed,
            3 => AttemptOutcome::Cooldown { until: now + COOLDOWN },
            _ => AttemptOutcome::Locked { until: now + LOCK },
        }
    }

    /// A successful verification resets the counter for that method.
    pub async fn record_success(&self, principal_id: &str, method: ChallengeMethod) {
        self.state
            .write()
            .await
            .remove(&(principal_id.to_string(), method));
    }

    pub async fn attempt_count(&self, principal_id: &str, method: ChallengeMethod, now: DateTime<Utc>) -> usize {
        let guard = self.state.read().await;
        guard
            .get(&(principal_id.to_string(), method))
            .map(|key| key.failures.iter().filter(|t| now - **t < WINDOW).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_three_failures_escalate_as_specified() {
        let tracker = LockoutTracker::new();
        let now = Utc::now();
        assert_eq!(
            tracker.record_failure("p1", ChallengeMethod::Totp, now).await,
            AttemptOutcome::Warn
        );
        assert_eq!(
            tracker.record_failure("p1", ChallengeMethod::Totp, now).await,
            AttemptOutcome::RetryAllowed
        );
        let third = tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        assert!(matches!(third, AttemptOutcome::Cooldown { .. }));
    }

    #[tokio::test]
    async fn fourth_failure_locks_the_account() {
        let tracker = LockoutTracker::new();
        let now = Utc::now();
        for _ in 0..3 {
            tracker.record_failure("p1", ChallengeMethod::Push, now).await;
        }
        let fourth = tracker.record_failure("p1", ChallengeMethod::Push, now).await;
        assert!(matches!(fourth, AttemptOutcome::Locked { .. }));
    }

    #[tokio::test]
    async fn success_resets_the_window() {
        let tracker = LockoutTracker::new();
        let now = Utc::now();
        tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        tracker.record_success("p1", ChallengeMethod::Totp).await;

        assert_eq!(
            tracker.record_failure("p1", ChallengeMethod::Totp, now).await,
            AttemptOutcome::Warn
        );
    }

    #[tokio::test]
    async fn failures_outside_window_do_not_accumulate() {
        let tracker = LockoutTracker::new();
        let now = Utc::now();
        tracker
            .record_failure("p1", ChallengeMethod::Totp, now - Duration::minutes(20))
            .await;
        let outcome = tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        assert_eq!(outcome, AttemptOutcome::Warn);
    }

    #[tokio::test]
    async fn methods_are_tracked_independently() {
        let tracker = LockoutTracker::new();
        let now = Utc::now();
        tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        tracker.record_failure("p1", ChallengeMethod::Totp, now).await;
        let push_outcome = tracker.record_failure("p1", ChallengeMethod::Push, now).await;
        assert_eq!(push_outcome, AttemptOutcome::Warn);
    }
}

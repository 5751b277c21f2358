//! Shared error taxonomy used across every governance component.
//!
//! Kinds are named after what rejected the request, not after a
//! transport status code: callers map a `GovernanceError` to whatever
//! wire representation their own ingress layer speaks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("permission denied: requires {required} (role {role})")]
    PermissionDenied { required: String, role: String },

    #[error("integrity violation on {entity_id}: {reason} (broken at {broken_at})")]
    IntegrityViolation {
        entity_id: String,
        broken_at: u64,
        reason: String,
    },

    #[error("concurrent append lost for {entity_id}")]
    ConflictSequence { entity_id: String },

    #[error("deadline exceeded waiting on {dependency}")]
    Timeout { dependency: String },

    #[error("locked out, retry after {retry_after_secs}s")]
    LockedOut { retry_after_secs: i64 },

    #[error("workspace {workspace_id} frozen by policy {policy_id}")]
    CircuitFrozen {
        workspace_id: String,
        policy_id: String,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("dependency unreachable: {0}")]
    Transient(String),
}

impl GovernanceError {
    /// Whether the shared retry handler should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}

/// `initialDelay=1s, maxDelay=10s, multiplier=2, jitter=25%, maxRetries=3`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: 0.25,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-indexed), with jitter applied.
    /// `max_delay_ms` bounds the final, jittered delay, not just the base.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jitter_span = capped * self.jitter;
        let jittered = capped - jitter_span + (rand::random::<f64>() * 2.0 * jitter_span);
        let bounded = jittered.max(0.0).min(self.max_delay_ms as f64);
        std::time::Duration::from_millis(bounded as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(GovernanceError::Transient("db".into()).is_retryable());
        assert!(GovernanceError::Timeout {
            dependency: "db".into()
        }
        .is_retryable());
        assert!(!GovernanceError::AuthRequired.is_retryable());
    }

    #[test]
    fn retry_delay_is_bounded_by_max_delay() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay.as_millis() <= policy.max_delay_ms as u128);
        }
    }
}

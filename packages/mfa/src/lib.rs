//! Adaptive MFA Orchestrator.
//!
//! Confidence scoring over six weighted factors drives a risk tier,
//! which in turn drives challenge-method selection, bypass windows,
//! and a per-method sliding-window lockout.

pub mod backup_codes;
pub mod challenge;
pub mod devices;
pub mod lockout;
pub mod orchestrator;
pub mod scoring;
pub mod types;

pub use orchestrator::{MfaOrchestrator, RiskDecision};
pub use types::{ChallengeMethod, MfaState, RiskLevel, RiskSignals, TwoFactorConfig};

//! Compliance Orchestrator: core types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outcome a matching policy rule can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Flag,
    Deny,
    Freeze,
}

impl Effect {
    /// `DENY > FREEZE > FLAG > ALLOW`: lower number wins a tie among
    /// simultaneously-matching rules.
    pub fn priority(self) -> u8 {
        match self {
            Self::Deny => 0,
            Self::Freeze => 1,
            Self::Flag => 2,
            Self::Allow => 3,
        }
    }
}

/// `evaluate(tenantId, resourceType, body, context)` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub tenant_id: String,
    pub resource_type: String,
    pub body: Value,
    pub context: EvaluationContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub user: Option<String>,
    pub ip: Option<String>,
    pub method: Option<String>,
    pub time: Option<DateTime<Utc>>,
    /// Injected by the Job Orchestrator, e.g. `dailyVelocity`.
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub request_id: Uuid,
    pub effect: Effect,
    pub evaluated_policies: Vec<String>,
    pub matching_policy_id: Option<String>,
    pub compliance_flag: Option<String>,
    pub reason: Option<String>,
}

impl EvaluationResult {
    pub fn proceeds(&self) -> bool {
        matches!(self.effect, Effect::Allow | Effect::Flag)
    }
}

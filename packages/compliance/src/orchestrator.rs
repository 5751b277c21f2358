//! Compliance Orchestrator: ordered policy evaluation with a circuit
//! breaker for `FREEZE` effects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;
use vigil_core::pattern;
use vigil_ledger::AuditLedger;

use crate::dsl::{self, EvalContext};
use crate::policy::{Policy, PolicyRule};
use crate::types::{EvaluationRequest, EvaluationResult, Effect};

const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_millis(50);

pub struct ComplianceOrchestrator {
    policies: Arc<RwLock<HashMap<String, Policy>>>,
    rule_timeout: Duration,
}

impl Default for ComplianceOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceOrchestrator {
    pub fn new() -> Self {
        Self {
            policies: Arc::new(RwLock::new(HashMap::new())),
            rule_timeout: DEFAULT_RULE_TIMEOUT,
        }
    }

    pub fn with_rule_timeout(mut self, timeout: Duration) -> Self {
        self.rule_timeout = timeout;
        self
    }

    pub async fn put_policy(&self, policy: Policy) {
        self.policies.write().await.insert(policy.id.clone(), policy);
    }

    /// Evaluate `request` against every enabled policy whose rule
    /// resource pattern matches. The first match by (effect priority,
    /// then evaluation order) wins; no match means implicit `ALLOW`.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let policies = self.policies.read().await;
        let mut enabled: Vec<&Policy> = policies.values().filter(|p| p.enabled).collect();
        enabled.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let eval_ctx = EvalContext::from_request(request);
        let mut evaluated_policies = Vec::new();
        let mut best: Option<(&Policy, &PolicyRule)> = None;

        for policy in &enabled {
            evaluated_policies.push(policy.id.clone());
            for rule in &policy.rules {
                if !pattern::matches(&rule.resource_pattern, &request.resource_type) {
                    continue;
                }
                let matched = self.evaluate_rule(rule, &eval_ctx).await;
                if !matched {
                    continue;
                }
                let replace = match best {
                    None => true,
                    Some((_, current)) => rule.effect.priority() < current.effect.priority(),
                };
                if replace {
                    best = Some((policy, rule));
                }
            }
        }

        let Some((policy, rule)) = best else {
            return EvaluationResult {
                request_id: Uuid::new_v4(),
                effect: Effect::Allow,
                evaluated_policies,
                matching_policy_id: None,
                compliance_flag: None,
                reason: None,
            };
        };

        tracing::info!(
            policy_id = %policy.id,
            rule_id = %rule.id,
            effect = ?rule.effect,
            tenant_id = %request.tenant_id,
            resource_type = %request.resource_type,
            "compliance rule matched"
        );

        EvaluationResult {
            request_id: Uuid::new_v4(),
            effect: rule.effect,
            evaluated_policies,
            matching_policy_id: Some(policy.id.clone()),
            compliance_flag: matches!(rule.effect, Effect::Flag).then(|| policy.id.clone()),
            reason: rule.message.clone(),
        }
    }

    /// Evaluate one rule's predicate under the configured timeout. A
    /// timeout is treated as `unknown`, i.e. no-match.
    async fn evaluate_rule(&self, rule: &PolicyRule, ctx: &EvalContext<'_>) -> bool {
        let condition = rule.condition.clone();
        match tokio::time::timeout(self.rule_timeout, async move { dsl::evaluate(&condition, ctx) }).await {
            Ok(result) => result,
            Err(_) => false,
        }
    }
}

/// Before any write on `entity_id`, verify its ledger chain is intact.
/// Read operations are not gated by this and fail open.
pub async fn integrity_guard(
    ledger: &AuditLedger,
    entity_id: &str,
) -> Result<(), vigil_core::GovernanceError> {
    let verification = ledger.audit_chain(entity_id).await;
    if verification.valid {
        Ok(())
    } else {
        Err(vigil_core::GovernanceError::IntegrityViolation {
            entity_id: entity_id.to_string(),
            broken_at: verification.broken_at.unwrap_or(0),
            reason: verification.reason.unwrap_or_default(),
        })
    }
}

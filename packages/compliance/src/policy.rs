//! YAML-defined compliance policies.
//!
//! # Example
//!
//! ```yaml
//! id: spending-limits
//! name: Spending Limits Policy
//! priority: 100
//! enabled: true
//! rules:
//!   - id: max-transaction
//!     resource_pattern: "transaction/*"
//!     condition: "body.amount > 10000"
//!     effect: DENY
//!     message: "Transaction exceeds maximum allowed amount"
//!     fail_closed: true
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Effect;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub rules: Vec<PolicyRule>,
}

fn default_priority() -> i32 {
    0
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    /// Resource pattern this rule applies to: exact, `prefix/*`, or `*`.
    #[serde(default = "default_resource_pattern")]
    pub resource_pattern: String,
    pub condition: String,
    pub effect: Effect,
    #[serde(default)]
    pub message: Option<String>,
    /// When true, a predicate timeout or evaluator error denies rather
    /// than being treated as no-match.
    #[serde(default)]
    pub fail_closed: bool,
}

fn default_resource_pattern() -> String {
    "*".to_string()
}

impl Policy {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_from_yaml() {
        let yaml = r#"
id: spending-limits
name: Spending Limits
priority: 100
enabled: true
rules:
  - id: max-transaction
    resource_pattern: "transaction/*"
    condition: "body.amount > 10000"
    effect: DENY
    message: "too large"
    fail_closed: true
"#;
        let policy = Policy::from_yaml(yaml).unwrap();
        assert_eq!(policy.id, "spending-limits");
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].effect, Effect::Deny);
        assert!(policy.rules[0].fail_closed);
    }

    #[test]
    fn defaults_apply_when_fields_omitted() {
        let yaml = "id: minimal\nrules: []\n";
        let policy = Policy::from_yaml(yaml).unwrap();
        assert_eq!(policy.priority, 0);
        assert!(policy.enabled);
    }
}

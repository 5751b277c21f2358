//! Hierarchical RBAC evaluator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use vigil_core::pattern;

use crate::types::{
    Condition, Membership, MembershipStatus, Permission, RbacDecision, RequestContext, Role,
    Workspace, WorkspaceStatus,
};

const MAX_PARENT_WALK: usize = 64;

fn is_write_permission(code: &str) -> bool {
    !(code.ends_with(":view") || code.starts_with("audit:"))
}

fn is_manager(role: Option<&Role>) -> bool {
    role.map(|r| r.name.eq_ignore_ascii_case("manager"))
        .unwrap_or(false)
}

#[derive(Default)]
struct Store {
    workspaces: HashMap<String, Workspace>,
    memberships: HashMap<(String, String), Membership>,
    roles: HashMap<String, Role>,
    permissions: HashMap<String, Permission>,
}

/// Resolves `(principal, workspace, permission, context)` against the
/// workspace forest, role-inheritance chain, and effective permission set.
pub struct RbacEvaluator {
    store: Arc<RwLock<Store>>,
}

impl Default for RbacEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RbacEvaluator {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    pub async fn put_workspace(&self, workspace: Workspace) {
        self.store.write().await.workspaces.insert(workspace.id.clone(), workspace);
    }

    pub async fn put_membership(&self, membership: Membership) {
        let key = (membership.principal_id.clone(), membership.workspace_id.clone());
        self.store.write().await.memberships.insert(key, membership);
    }

    pub async fn put_role(&self, role: Role) {
        self.store.write().await.roles.insert(role.id.clone(), role);
    }

    pub async fn put_permission(&self, permission: Permission) {
        self.store
            .write()
            .await
            .permissions
            .insert(permission.code.clone(), permission);
    }

    async fn resolve_membership(
        &self,
        store: &Store,
        principal_id: &str,
        workspace_id: &str,
    ) -> Option<Membership> {
        if let Some(m) = store
            .memberships
            .get(&(principal_id.to_string(), workspace_id.to_string()))
        {
            return Some(m.clone());
        }

        let mut current = store.workspaces.get(workspace_id)?;
        if !current.inheritance.inherit_members {
            return None;
        }

        for _ in 0..MAX_PARENT_WALK {
            let parent_id = current.parent_id.as_ref()?;
            if let Some(m) = store
                .memberships
                .get(&(principal_id.to_string(), parent_id.clone()))
            {
                return Some(m.clone());
            }
            current = store.workspaces.get(parent_id)?;
            if !current.inheritance.inherit_members {
                return None;
            }
        }
        None
    }

    fn resolve_role_permissions(&self, store: &Store, role_id: &str) -> HashSet<String> {
        let mut accumulated = HashSet::new();
        let mut visited = HashSet::new();
        let mut current_id = Some(role_id.to_string());

        while let Some(id) = current_id {
            if !visited.insert(id.clone()) {
                break;
            }
            let Some(role) = store.roles.get(&id) else {
                break;
            };
            accumulated.extend(role.permissions.iter().cloned());
            current_id = role.inherits_from.clone();
        }

        accumulated
    }

    fn evaluate_conditions(&self, conditions: &[Condition], context: &RequestContext) -> bool {
        conditions.iter().all(|condition| match condition {
            Condition::TimeWindow { start_hour, end_hour } => match context.hour_of_day {
                Some(hour) => hour >= *start_hour && hour < *end_hour,
                None => false,
            },
            Condition::GeoAllowlist { countries } => match &context.country {
                Some(country) => countries.iter().any(|c| c == country),
                None => false,
            },
            Condition::DeviceAllowlist { user_agents } => match &context.user_agent {
                Some(ua) => user_agents.iter().any(|allowed| ua.contains(allowed.as_str())),
                None => false,
            },
            Condition::AmountLimit { max_amount } => match context.amount {
                Some(amount) => amount <= *max_amount,
                None => true,
            },
            Condition::Custom { .. } => true,
        })
    }

    pub async fn evaluate(
        &self,
        principal_id: &str,
        workspace_id: &str,
        permission_code: &str,
        context: &RequestContext,
    ) -> RbacDecision {
        let store = self.store.read().await;

        let Some(workspace) = store.workspaces.get(workspace_id) else {
            return RbacDecision::Deny {
                reason: format!("workspace {workspace_id} not found"),
            };
        };

        if workspace.status == WorkspaceStatus::Suspended {
            return RbacDecision::Deny {
                reason: "workspace suspended".to_string(),
            };
        }

        let Some(membership) = self.resolve_membership(&store, principal_id, workspace_id).await
        else {
            return RbacDecision::Deny {
                reason: "no membership".to_string(),
            };
        };

        if membership.status == MembershipStatus::Inactive {
            return RbacDecision::Deny {
                reason: "inactive membership".to_string(),
            };
        }

        let role = store.roles.get(&membership.role_id);
        let is_owner = membership.principal_id == workspace.owner_principal_id;

        if workspace.status == WorkspaceStatus::Frozen {
            if is_write_permission(permission_code) {
                return RbacDecision::Deny {
                    reason: "workspace compliance-frozen: writes blocked".to_string(),
                };
            }
            if is_owner || is_manager(role) {
                return RbacDecision::Allow;
            }
        } else if is_owner {
            return RbacDecision::Allow;
        }

        let role_perms = self.resolve_role_permissions(&store, &membership.role_id);

        let granted_patterns: HashSet<&str> = role_perms
            .iter()
            .map(String::as_str)
            .chain(membership.custom_grants.iter().map(String::as_str))
            .collect();

        let restricted = membership
            .restricted_grants
            .iter()
            .any(|pattern_str| pattern::matches(pattern_str, permission_code));

        let granted = !restricted
            && pattern::best_match(granted_patterns, permission_code).is_some();

        if !granted {
            return RbacDecision::NeedsPolicyOverride {
                reason: format!("{permission_code} not in effective permission set"),
            };
        }

        let conditions_ok = store
            .permissions
            .get(permission_code)
            .map(|p: &Permission| self.evaluate_conditions(&p.conditions, context))
            .unwrap_or(true);

        if conditions_ok {
            RbacDecision::Allow
        } else {
            RbacDecision::NeedsPolicyOverride {
                reason: format!("{permission_code} condition not satisfied"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InheritanceSettings, WorkspaceType};
    use chrono::Utc;

    fn workspace(id: &str, parent: Option<&str>, owner: &str, status: WorkspaceStatus) -> Workspace {
        Workspace {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            workspace_type: WorkspaceType::Team,
            owner_principal_id: owner.to_string(),
            cache_epoch: 0,
            status,
            inheritance: InheritanceSettings {
                inherit_members: true,
                inherit_rules: true,
                inherit_categories: true,
                allow_overrides: false,
            },
        }
    }

    fn membership(principal: &str, workspace: &str, role: &str) -> Membership {
        Membership {
            principal_id: principal.to_string(),
            workspace_id: workspace.to_string(),
            role_id: role.to_string(),
            status: MembershipStatus::Active,
            custom_grants: HashSet::new(),
            restricted_grants: HashSet::new(),
            joined_at: Utc::now(),
            invited_by: None,
        }
    }

    #[tokio::test]
    async fn owner_is_always_allowed() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "alice", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("alice", "ws-1", "member")).await;

        let decision = evaluator
            .evaluate("alice", "ws-1", "TRANSACTION_CREATE", &RequestContext::default())
            .await;
        assert_eq!(decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn role_grant_allows_matching_permission() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("bob", "ws-1", "viewer")).await;
        evaluator
            .put_role(Role {
                id: "viewer".to_string(),
                name: "Viewer".to_string(),
                permissions: vec!["TRANSACTION_VIEW".to_string()],
                inherits_from: None,
            })
            .await;

        let decision = evaluator
            .evaluate("bob", "ws-1", "TRANSACTION_VIEW", &RequestContext::default())
            .await;
        assert_eq!(decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn role_inheritance_chain_accumulates_permissions() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("carol", "ws-1", "senior")).await;
        evaluator
            .put_role(Role {
                id: "base".to_string(),
                name: "Base".to_string(),
                permissions: vec!["TRANSACTION_VIEW".to_string()],
                inherits_from: None,
            })
            .await;
        evaluator
            .put_role(Role {
                id: "senior".to_string(),
                name: "Senior".to_string(),
                permissions: vec!["TRANSACTION_CREATE".to_string()],
                inherits_from: Some("base".to_string()),
            })
            .await;

        let decision = evaluator
            .evaluate("carol", "ws-1", "TRANSACTION_VIEW", &RequestContext::default())
            .await;
        assert_eq!(decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn role_inheritance_cycle_terminates() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("dan", "ws-1", "a")).await;
        evaluator
            .put_role(Role {
                id: "a".to_string(),
                name: "A".to_string(),
                permissions: vec!["PERM_A".to_string()],
                inherits_from: Some("b".to_string()),
            })
            .await;
        evaluator
            .put_role(Role {
                id: "b".to_string(),
                name: "B".to_string(),
                permissions: vec!["PERM_B".to_string()],
                inherits_from: Some("a".to_string()),
            })
            .await;

        let decision = evaluator
            .evaluate("dan", "ws-1", "PERM_B", &RequestContext::default())
            .await;
        assert_eq!(decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn restricted_grant_shadows_role_grant() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        let mut m = membership("erin", "ws-1", "senior");
        m.restricted_grants.insert("TRANSACTION_CREATE".to_string());
        evaluator.put_membership(m).await;
        evaluator
            .put_role(Role {
                id: "senior".to_string(),
                name: "Senior".to_string(),
                permissions: vec!["TRANSACTION_CREATE".to_string()],
                inherits_from: None,
            })
            .await;

        let decision = evaluator
            .evaluate("erin", "ws-1", "TRANSACTION_CREATE", &RequestContext::default())
            .await;
        assert!(matches!(decision, RbacDecision::NeedsPolicyOverride { .. }));
    }

    #[tokio::test]
    async fn inactive_membership_always_denies() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        let mut m = membership("frank", "ws-1", "viewer");
        m.status = MembershipStatus::Inactive;
        evaluator.put_membership(m).await;

        let decision = evaluator
            .evaluate("frank", "ws-1", "TRANSACTION_VIEW", &RequestContext::default())
            .await;
        assert!(matches!(decision, RbacDecision::Deny { .. }));
    }

    #[tokio::test]
    async fn suspended_workspace_always_denies() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Suspended))
            .await;
        evaluator.put_membership(membership("owner", "ws-1", "member")).await;

        let decision = evaluator
            .evaluate("owner", "ws-1", "TRANSACTION_VIEW", &RequestContext::default())
            .await;
        assert!(matches!(decision, RbacDecision::Deny { .. }));
    }

    #[tokio::test]
    async fn frozen_workspace_blocks_writes_but_allows_manager_view() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Frozen))
            .await;
        evaluator.put_membership(membership("greta", "ws-1", "manager-role")).await;
        evaluator
            .put_role(Role {
                id: "manager-role".to_string(),
                name: "Manager".to_string(),
                permissions: vec![],
                inherits_from: None,
            })
            .await;

        let write_decision = evaluator
            .evaluate("greta", "ws-1", "TRANSACTION_CREATE", &RequestContext::default())
            .await;
        assert!(matches!(write_decision, RbacDecision::Deny { .. }));

        let view_decision = evaluator
            .evaluate("greta", "ws-1", "TRANSACTION_VIEW:view", &RequestContext::default())
            .await;
        assert_eq!(view_decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn membership_inherited_from_parent_workspace() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("parent", None, "owner", WorkspaceStatus::Active))
            .await;
        evaluator
            .put_workspace(workspace("child", Some("parent"), "owner", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("hank", "parent", "viewer")).await;
        evaluator
            .put_role(Role {
                id: "viewer".to_string(),
                name: "Viewer".to_string(),
                permissions: vec!["TRANSACTION_VIEW".to_string()],
                inherits_from: None,
            })
            .await;

        let decision = evaluator
            .evaluate("hank", "child", "TRANSACTION_VIEW", &RequestContext::default())
            .await;
        assert_eq!(decision, RbacDecision::Allow);
    }

    #[tokio::test]
    async fn amount_limit_condition_rejects_over_limit() {
        let evaluator = RbacEvaluator::new();
        evaluator
            .put_workspace(workspace("ws-1", None, "owner", WorkspaceStatus::Active))
            .await;
        evaluator.put_membership(membership("iris", "ws-1", "approver")).await;
        evaluator
            .put_role(Role {
                id: "approver".to_string(),
                name: "Approver".to_string(),
                permissions: vec!["PAYMENT_APPROVE".to_string()],
                inherits_from: None,
            })
            .await;
        evaluator
            .put_permission(Permission {
                code: "PAYMENT_APPROVE".to_string(),
                module: "payments".to_string(),
                description: "approve a payment".to_string(),
                actions: vec!["approve".to_string()],
                conditions: vec![Condition::AmountLimit { max_amount: 1000.0 }],
            })
            .await;

        let mut context = RequestContext::default();
        context.amount = Some(5000.0);
        let decision = evaluator.evaluate("iris", "ws-1", "PAYMENT_APPROVE", &context).await;
        assert!(matches!(decision, RbacDecision::NeedsPolicyOverride { .. }));
    }
}

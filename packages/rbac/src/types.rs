//! Hierarchical RBAC: data model.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceType {
    Company,
    Department,
    Team,
    Project,
    Sandbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Active,
    Archived,
    Suspended,
    Frozen,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InheritanceSettings {
    pub inherit_members: bool,
    pub inherit_rules: bool,
    pub inherit_categories: bool,
    pub allow_overrides: bool,
}

/// A node in the workspace forest. `parent_id` is the materialized parent
/// pointer; the full ancestor chain is walked one hop at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub parent_id: Option<String>,
    pub workspace_type: WorkspaceType,
    pub owner_principal_id: String,
    pub cache_epoch: u64,
    pub status: WorkspaceStatus,
    pub inheritance: InheritanceSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub principal_id: String,
    pub workspace_id: String,
    pub role_id: String,
    pub status: MembershipStatus,
    pub custom_grants: HashSet<String>,
    pub restricted_grants: HashSet<String>,
    pub joined_at: DateTime<Utc>,
    pub invited_by: Option<String>,
}

/// Permissions are referenced by stable string code, never by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub inherits_from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    TimeWindow { start_hour: u32, end_hour: u32 },
    GeoAllowlist { countries: Vec<String> },
    DeviceAllowlist { user_agents: Vec<String> },
    AmountLimit { max_amount: f64 },
    Custom { predicate_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub code: String,
    pub module: String,
    pub description: String,
    pub actions: Vec<String>,
    pub conditions: Vec<Condition>,
}

/// Context accompanying an access check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub country: Option<String>,
    pub user_agent: Option<String>,
    pub hour_of_day: Option<u32>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbacDecision {
    Allow,
    Deny { reason: String },
    /// RBAC found no matching grant or a condition failed; the caller
    /// should consult the Compliance Orchestrator for a possible override.
    NeedsPolicyOverride { reason: String },
}

impl RbacDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

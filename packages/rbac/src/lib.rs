//! Hierarchical RBAC evaluator.
//!
//! Resolves `(principal, workspace, permission, context)` against a forest
//! of workspaces, per-workspace memberships, and role inheritance chains
//! into an effective permission set. When RBAC can't reach a decision on
//! its own it returns [`RbacDecision::NeedsPolicyOverride`], deferring to
//! the Compliance Orchestrator.

pub mod evaluator;
pub mod types;

pub use evaluator::RbacEvaluator;
pub use types::{
    Condition, InheritanceSettings, Membership, MembershipStatus, Permission, RbacDecision,
    RequestContext, Role, Workspace, WorkspaceStatus, WorkspaceType,
};

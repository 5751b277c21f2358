//! Shared primitives: identifiers, the error taxonomy, and resource
//! pattern matching, used by every crate in the security-governance core.

pub mod error;
pub mod ids;
pub mod pattern;

pub use error::{GovernanceError, RetryPolicy};
pub use ids::{PermissionCode, PrincipalId, RoleId, WorkspaceId};

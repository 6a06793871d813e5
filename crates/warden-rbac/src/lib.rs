//! Warden RBAC: effective-permission resolution over role
//! hierarchies, aggregation across a user's assigned roles, structural
//! role diffs, and the mutating role/assignment operations.

pub mod aggregate;
pub mod compare;
pub mod resolver;
pub mod service;

pub use aggregate::UserPermissionAggregator;
pub use compare::{ComparedRole, PermissionDifference, RoleComparator, RoleComparison};
pub use resolver::{MAX_CHAIN_DEPTH, PermissionResolver};
pub use service::{AssignOutcome, RoleDetails, RoleService};

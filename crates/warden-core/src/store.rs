//! Store trait definitions for data access abstraction.
//!
//! All store operations are async. The algorithmic crates are generic
//! over these traits so they carry no dependency on the database crate.

use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    audit::{AuditEvent, AuditFilter, NewAuditEvent},
    role::{CreateRole, Role, UpdateRole},
    user::{CreateUser, User, UserRef},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Durable lookup and mutation of role records.
pub trait RoleStore: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Role>> + Send;
    fn find_by_name(&self, name: &str) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Apply a field-enumerated update. If `input.expected_version` is
    /// set and does not match the stored version, fails with
    /// `ConcurrentModification` and leaves the role unchanged.
    fn update(
        &self,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = WardenResult<Role>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Role>>> + Send;

    /// All users currently holding the given role.
    fn find_users_with_role(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<UserRef>>> + Send;

    /// Remove the role from every user's assignment list, returning the
    /// number of users actually modified. Idempotent: re-running after a
    /// partial failure is safe.
    fn detach_role_from_all_users(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<u64>> + Send;
}

/// Durable lookup and mutation of user role-assignment records.
pub trait UserStore: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<User>>> + Send;

    /// Add a role to the user's assignment list. Returns `false` if the
    /// user already held the role (no change made). The guard is applied
    /// store-side, so re-running never double-adds.
    fn add_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<bool>> + Send;

    /// Remove a role from the user's assignment list. Returns `false`
    /// if the user did not hold the role (removal of an absent
    /// reference is a no-op).
    fn remove_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<bool>> + Send;
}

/// Append-only sink for audit events.
///
/// Callers treat writes as best-effort: the service layer logs and
/// discards failures rather than letting them abort the primary action.
pub trait AuditSink: Send + Sync {
    fn record(
        &self,
        input: NewAuditEvent,
    ) -> impl Future<Output = WardenResult<AuditEvent>> + Send;
    fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<AuditEvent>>> + Send;
}

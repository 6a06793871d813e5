//! Role and assignment mutations, with best-effort audit emission.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use warden_core::error::{WardenError, WardenResult};
use warden_core::models::audit::{AuditAction, AuditEntityType, NewAuditEvent};
use warden_core::models::permission::{EffectivePermissions, PermissionEntry};
use warden_core::models::role::{CreateRole, Role, UpdateRole};
use warden_core::models::user::UserRef;
use warden_core::store::{AuditSink, PaginatedResult, Pagination, RoleStore, UserStore};

use crate::compare::{RoleComparator, RoleComparison};
use crate::resolver::PermissionResolver;

const MAX_DESCRIPTION_LEN: usize = 500;

/// Outcome of a single-user role assignment. Assigning an already-held
/// role is an informational no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    AlreadyAssigned,
}

/// A role together with its resolved effective permissions.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetails {
    pub role: Role,
    pub effective_permissions: EffectivePermissions,
}

/// Administrative role operations.
///
/// Generic over the store traits so this layer has no dependency on
/// the database crate. Every mutating operation takes the
/// authenticated administrator identity as `performed_by` and, on
/// success, emits exactly one audit event; audit writes are
/// best-effort and never fail the triggering operation.
pub struct RoleService<R: RoleStore + Clone, U: UserStore, A: AuditSink> {
    roles: R,
    users: U,
    audit: A,
    resolver: PermissionResolver<R>,
    comparator: RoleComparator<R>,
}

impl<R: RoleStore + Clone, U: UserStore, A: AuditSink> RoleService<R, U, A> {
    pub fn new(roles: R, users: U, audit: A) -> Self {
        Self {
            resolver: PermissionResolver::new(roles.clone()),
            comparator: RoleComparator::new(roles.clone()),
            roles,
            users,
            audit,
        }
    }

    // -------------------------------------------------------------------
    // Read paths
    // -------------------------------------------------------------------

    /// Fetch a role together with its resolved effective permissions.
    pub async fn get_role(&self, id: Uuid) -> WardenResult<RoleDetails> {
        let role = self.roles.get_by_id(id).await?;
        let effective_permissions = self.resolver.resolve_effective(id).await?;
        Ok(RoleDetails {
            role,
            effective_permissions,
        })
    }

    pub async fn list_roles(&self, pagination: Pagination) -> WardenResult<PaginatedResult<Role>> {
        self.roles.list(pagination).await
    }

    /// All users currently holding the role.
    pub async fn users_with_role(&self, role_id: Uuid) -> WardenResult<Vec<UserRef>> {
        // Surface NotFound for a bogus role id rather than an empty list.
        self.roles.get_by_id(role_id).await?;
        self.roles.find_users_with_role(role_id).await
    }

    // -------------------------------------------------------------------
    // Role CRUD
    // -------------------------------------------------------------------

    pub async fn create_role(
        &self,
        performed_by: Uuid,
        mut input: CreateRole,
    ) -> WardenResult<Role> {
        validate_name(&input.name)?;
        validate_description(&input.description)?;
        validate_permissions(&input.permissions)?;
        self.ensure_name_unused(&input.name).await?;

        if let Some(parent_id) = input.parent_role_id {
            // Parent must exist and its chain must already be sound.
            self.roles.get_by_id(parent_id).await?;
            self.resolver.ensure_acyclic(None, parent_id).await?;
        }

        input.created_by = Some(performed_by);
        let role = self.roles.create(input).await?;
        info!(role_id = %role.id, name = %role.name, "role created");

        self.record_audit(NewAuditEvent {
            action: AuditAction::RoleCreated,
            entity_type: AuditEntityType::Role,
            entity_id: role.id,
            performed_by,
            target_user: None,
            target_role: Some(role.id),
            changes: json!({}),
            description: format!("Role \"{}\" created", role.name),
            metadata: json!({}),
        })
        .await;

        Ok(role)
    }

    pub async fn update_role(
        &self,
        performed_by: Uuid,
        id: Uuid,
        mut input: UpdateRole,
    ) -> WardenResult<Role> {
        let before = self.roles.get_by_id(id).await?;

        if let Some(description) = &input.description {
            validate_description(description)?;
        }
        if let Some(permissions) = &input.permissions {
            validate_permissions(permissions)?;
        }
        if let Some(Some(parent_id)) = input.parent_role_id {
            self.roles.get_by_id(parent_id).await?;
            // Reject before any write: the proposed chain must not loop
            // back through the role being updated.
            self.resolver.ensure_acyclic(Some(id), parent_id).await?;
        }

        input.updated_by = Some(performed_by);
        let after = self.roles.update(id, input).await?;
        info!(role_id = %after.id, version = after.version, "role updated");

        self.record_audit(NewAuditEvent {
            action: AuditAction::RoleUpdated,
            entity_type: AuditEntityType::Role,
            entity_id: after.id,
            performed_by,
            target_user: None,
            target_role: Some(after.id),
            changes: json!({ "before": before, "after": after }),
            description: format!("Role \"{}\" updated", after.name),
            metadata: json!({}),
        })
        .await;

        Ok(after)
    }

    /// Delete a role, first detaching it from every user that holds it.
    ///
    /// Both steps are idempotent, so a retry after a partial failure
    /// re-runs the cascade safely. The detach is verified before the
    /// role record itself is removed, so a crash in between cannot
    /// leave a dangling reference that still resolves.
    pub async fn delete_role(&self, performed_by: Uuid, id: Uuid) -> WardenResult<()> {
        let role = self.roles.get_by_id(id).await?;

        let detached = self.roles.detach_role_from_all_users(id).await?;
        let remaining = self.roles.find_users_with_role(id).await?;
        if !remaining.is_empty() {
            return Err(WardenError::Internal(format!(
                "role {id} still referenced by {} users after detach",
                remaining.len()
            )));
        }

        self.roles.delete(id).await?;
        info!(role_id = %id, detached_users = detached, "role deleted");

        self.record_audit(NewAuditEvent {
            action: AuditAction::RoleDeleted,
            entity_type: AuditEntityType::Role,
            entity_id: id,
            performed_by,
            target_user: None,
            target_role: Some(id),
            changes: json!({ "detached_users": detached }),
            description: format!("Role \"{}\" deleted", role.name),
            metadata: json!({}),
        })
        .await;

        Ok(())
    }

    // -------------------------------------------------------------------
    // Assignments
    // -------------------------------------------------------------------

    pub async fn assign_role_to_user(
        &self,
        performed_by: Uuid,
        role_id: Uuid,
        user_id: Uuid,
    ) -> WardenResult<AssignOutcome> {
        let role = self.roles.get_by_id(role_id).await?;
        let user = self.users.get_by_id(user_id).await?;

        if !self.users.add_role(user_id, role_id).await? {
            return Ok(AssignOutcome::AlreadyAssigned);
        }

        self.record_audit(NewAuditEvent {
            action: AuditAction::UserAssigned,
            entity_type: AuditEntityType::User,
            entity_id: user.id,
            performed_by,
            target_user: Some(user.id),
            target_role: Some(role.id),
            changes: json!({}),
            description: format!(
                "User \"{}\" assigned to role \"{}\"",
                user.username, role.name
            ),
            metadata: json!({}),
        })
        .await;

        Ok(AssignOutcome::Assigned)
    }

    /// Remove a role from a user. Removing a role the user does not
    /// hold is a no-op and emits no audit event.
    pub async fn remove_role_from_user(
        &self,
        performed_by: Uuid,
        role_id: Uuid,
        user_id: Uuid,
    ) -> WardenResult<bool> {
        let role = self.roles.get_by_id(role_id).await?;
        let user = self.users.get_by_id(user_id).await?;

        if !self.users.remove_role(user_id, role_id).await? {
            return Ok(false);
        }

        self.record_audit(NewAuditEvent {
            action: AuditAction::UserRemoved,
            entity_type: AuditEntityType::User,
            entity_id: user.id,
            performed_by,
            target_user: Some(user.id),
            target_role: Some(role.id),
            changes: json!({}),
            description: format!(
                "User \"{}\" removed from role \"{}\"",
                user.username, role.name
            ),
            metadata: json!({}),
        })
        .await;

        Ok(true)
    }

    /// Idempotently assign the role to many users; users already
    /// holding it (or ids that do not resolve) are skipped. Returns the
    /// number of users actually modified.
    pub async fn bulk_assign_role(
        &self,
        performed_by: Uuid,
        role_id: Uuid,
        user_ids: &[Uuid],
    ) -> WardenResult<u64> {
        let role = self.roles.get_by_id(role_id).await?;

        let mut count: u64 = 0;
        for user_id in user_ids {
            match self.users.add_role(*user_id, role_id).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(WardenError::NotFound { .. }) => {
                    warn!(user_id = %user_id, "bulk assign skipped unknown user");
                }
                Err(e) => return Err(e),
            }
        }
        info!(role_id = %role_id, count, "bulk assignment applied");

        self.record_audit(NewAuditEvent {
            action: AuditAction::BulkAssignment,
            entity_type: AuditEntityType::Role,
            entity_id: role.id,
            performed_by,
            target_user: None,
            target_role: Some(role.id),
            changes: json!({ "user_ids": user_ids, "count": count }),
            description: format!("Bulk assigned role \"{}\" to {count} users", role.name),
            metadata: json!({}),
        })
        .await;

        Ok(count)
    }

    // -------------------------------------------------------------------
    // Comparison
    // -------------------------------------------------------------------

    pub async fn compare_roles(
        &self,
        performed_by: Uuid,
        id_a: Uuid,
        id_b: Uuid,
    ) -> WardenResult<RoleComparison> {
        let comparison = self.comparator.compare(id_a, id_b).await?;

        self.record_audit(NewAuditEvent {
            action: AuditAction::RoleCompared,
            entity_type: AuditEntityType::Role,
            entity_id: id_a,
            performed_by,
            target_user: None,
            target_role: Some(id_a),
            changes: json!({}),
            description: format!(
                "Compared roles \"{}\" and \"{}\"",
                comparison.role_a.name, comparison.role_b.name
            ),
            metadata: json!({}),
        })
        .await;

        Ok(comparison)
    }

    // -------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------

    async fn ensure_name_unused(&self, name: &str) -> WardenResult<()> {
        match self.roles.find_by_name(name).await {
            Ok(_) => Err(WardenError::Validation {
                message: format!("role name \"{name}\" is already in use"),
            }),
            Err(WardenError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Best-effort audit write: failures are logged and discarded so
    /// they never abort the primary action.
    async fn record_audit(&self, event: NewAuditEvent) {
        let action = event.action;
        if let Err(err) = self.audit.record(event).await {
            warn!(action = action.as_str(), error = %err, "audit write failed, event discarded");
        }
    }
}

fn validate_name(name: &str) -> WardenResult<()> {
    if name.trim().is_empty() {
        return Err(WardenError::Validation {
            message: "role name must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> WardenResult<()> {
    if description.trim().is_empty() {
        return Err(WardenError::Validation {
            message: "role description must not be empty".into(),
        });
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(WardenError::Validation {
            message: format!("role description exceeds {MAX_DESCRIPTION_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_permissions(entries: &[PermissionEntry]) -> WardenResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for entry in entries {
        if !seen.insert(entry.module) {
            return Err(WardenError::Validation {
                message: format!("duplicate permission entry for module {}", entry.module),
            });
        }
    }
    Ok(())
}

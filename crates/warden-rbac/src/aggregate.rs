//! Aggregation of effective permissions across a user's assigned roles.

use uuid::Uuid;

use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{EffectivePermissions, Module, PermissionAction};
use warden_core::store::{RoleStore, UserStore};

use crate::resolver::PermissionResolver;

/// Combines effective permissions across all of a user's assigned
/// roles.
///
/// Cross-role aggregation is always a flag-wise OR: a user is granted a
/// capability if at least one assigned role grants it. Each role's own
/// conflict-resolution strategy governs only its parent chain and plays
/// no part here.
pub struct UserPermissionAggregator<R: RoleStore, U: UserStore> {
    users: U,
    resolver: PermissionResolver<R>,
}

impl<R: RoleStore, U: UserStore> UserPermissionAggregator<R, U> {
    pub fn new(roles: R, users: U) -> Self {
        Self {
            users,
            resolver: PermissionResolver::new(roles),
        }
    }

    /// Resolve the union of effective permissions over every role the
    /// user holds. A role id that no longer resolves is skipped rather
    /// than failing the whole aggregation.
    pub async fn resolve_user_permissions(
        &self,
        user_id: Uuid,
    ) -> WardenResult<EffectivePermissions> {
        let user = self.users.get_by_id(user_id).await?;

        let mut aggregate = EffectivePermissions::new();
        for role_id in &user.assigned_roles {
            let effective = match self.resolver.resolve_effective(*role_id).await {
                Ok(map) => map,
                Err(WardenError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            for (module, flags) in effective {
                let entry = aggregate.entry(module).or_default();
                *entry = entry.union(&flags);
            }
        }
        Ok(aggregate)
    }

    /// True iff at least one assigned role, after resolution, grants
    /// `action` on `module`. An absent module means no grant.
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        module: Module,
        action: PermissionAction,
    ) -> WardenResult<bool> {
        let aggregate = self.resolve_user_permissions(user_id).await?;
        Ok(aggregate
            .get(&module)
            .is_some_and(|flags| flags.allows(action)))
    }
}

//! Effective-permission resolution over the parent-role chain.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{EffectivePermissions, Module, PermissionFlags};
use warden_core::models::role::{ConflictResolution, Role};
use warden_core::store::RoleStore;

/// Upper bound on the length of a parent chain. Chains this deep are
/// rejected even when technically acyclic.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Computes a role's effective permission map by walking its parent
/// chain and merging each role's own permissions according to that
/// role's conflict-resolution strategy.
///
/// Resolution is a pure read over the store: it holds no locks and is
/// safe to run concurrently with other resolutions.
#[derive(Clone)]
pub struct PermissionResolver<R: RoleStore> {
    roles: R,
}

impl<R: RoleStore> PermissionResolver<R> {
    pub fn new(roles: R) -> Self {
        Self { roles }
    }

    /// Resolve the effective permissions of a role.
    ///
    /// The chain is collected child-to-root first (stopping at the
    /// first role with `inherit_permissions == false`, no parent, or a
    /// parent that no longer exists), then folded root-to-child so each
    /// role's own entries are merged on top of everything it inherits.
    pub async fn resolve_effective(&self, role_id: Uuid) -> WardenResult<EffectivePermissions> {
        let chain = self.collect_chain(role_id).await?;

        let mut ancestors = chain.into_iter().rev();
        // The chain is never empty: collect_chain fetches at least role_id.
        let root = ancestors
            .next()
            .ok_or_else(|| WardenError::Internal("empty role chain".into()))?;

        let mut effective = root.permissions;
        for role in ancestors {
            effective = apply_strategy(effective, &role.permissions, role.conflict_resolution);
        }
        Ok(effective)
    }

    /// Guard used before a create or update that sets a parent: walking
    /// up from `parent_id` must never reach `candidate` (the role being
    /// written, when it already exists) nor revisit any role.
    ///
    /// Unlike resolution, this follows `parent_role_id` regardless of
    /// `inherit_permissions` — the acyclicity invariant is structural.
    pub async fn ensure_acyclic(
        &self,
        candidate: Option<Uuid>,
        parent_id: Uuid,
    ) -> WardenResult<()> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut next = Some(parent_id);

        while let Some(id) = next {
            if Some(id) == candidate || !visited.insert(id) {
                return Err(WardenError::CycleDetected {
                    role_id: id.to_string(),
                });
            }
            if visited.len() > MAX_CHAIN_DEPTH {
                return Err(WardenError::Validation {
                    message: format!("role chain exceeds maximum depth of {MAX_CHAIN_DEPTH}"),
                });
            }
            next = match self.roles.get_by_id(id).await {
                Ok(role) => role.parent_role_id,
                // A dangling reference ends the chain; nothing above it
                // can close a loop.
                Err(WardenError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
        }
        Ok(())
    }

    /// Fetch the role and its consulted ancestors, child first.
    ///
    /// `NotFound` is surfaced only for the requested role. An ancestor
    /// that no longer resolves (its deletion did not rewrite child
    /// parent pointers) simply ends the chain, so the roles below it
    /// keep their own grants.
    async fn collect_chain(&self, role_id: Uuid) -> WardenResult<Vec<Role>> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut chain = Vec::new();
        let mut next = Some(role_id);

        while let Some(id) = next {
            if !visited.insert(id) {
                return Err(WardenError::CycleDetected {
                    role_id: id.to_string(),
                });
            }
            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(WardenError::Validation {
                    message: format!("role chain exceeds maximum depth of {MAX_CHAIN_DEPTH}"),
                });
            }

            let role = match self.roles.get_by_id(id).await {
                Ok(role) => role,
                Err(WardenError::NotFound { .. }) if !chain.is_empty() => break,
                Err(e) => return Err(e),
            };
            next = if role.inherit_permissions {
                role.parent_role_id
            } else {
                None
            };
            chain.push(role);
        }
        Ok(chain)
    }
}

/// Merge a role's own permissions on top of the permissions it
/// inherits, per the role's conflict-resolution strategy.
///
/// Modules present on only one side always carry through unchanged;
/// the strategy only decides per-module conflicts.
fn apply_strategy(
    inherited: EffectivePermissions,
    own: &BTreeMap<Module, PermissionFlags>,
    strategy: ConflictResolution,
) -> EffectivePermissions {
    let mut result = inherited;
    for (module, flags) in own {
        match strategy {
            ConflictResolution::Override => {
                result.insert(*module, *flags);
            }
            ConflictResolution::Merge => {
                let entry = result.entry(*module).or_default();
                *entry = entry.union(flags);
            }
            ConflictResolution::Inherit => {
                // Parent wins on conflict; child-only modules still land.
                result.entry(*module).or_insert(*flags);
            }
        }
    }
    result
}

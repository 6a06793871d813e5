//! Structural comparison of two roles' effective permissions.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use warden_core::error::WardenResult;
use warden_core::models::permission::{EffectivePermissions, Module, PermissionFlags};
use warden_core::store::RoleStore;

use crate::resolver::PermissionResolver;

/// One role's side of a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparedRole {
    pub id: Uuid,
    pub name: String,
    pub permissions: EffectivePermissions,
}

/// A module whose resolved flag tuple differs between the two roles.
/// A module absent from one side compares as all-false.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PermissionDifference {
    pub module: Module,
    pub a: PermissionFlags,
    pub b: PermissionFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleComparison {
    pub role_a: ComparedRole,
    pub role_b: ComparedRole,
    pub differences: Vec<PermissionDifference>,
}

/// Resolves two roles and produces a structured diff of their
/// effective permissions. Pure read; auditing the comparison is the
/// caller's responsibility.
pub struct RoleComparator<R: RoleStore> {
    roles: R,
    resolver: PermissionResolver<R>,
}

impl<R: RoleStore + Clone> RoleComparator<R> {
    pub fn new(roles: R) -> Self {
        Self {
            resolver: PermissionResolver::new(roles.clone()),
            roles,
        }
    }

    pub async fn compare(&self, id_a: Uuid, id_b: Uuid) -> WardenResult<RoleComparison> {
        let role_a = self.roles.get_by_id(id_a).await?;
        let role_b = self.roles.get_by_id(id_b).await?;

        let perms_a = self.resolver.resolve_effective(id_a).await?;
        let perms_b = self.resolver.resolve_effective(id_b).await?;

        let modules: BTreeSet<Module> = perms_a.keys().chain(perms_b.keys()).copied().collect();

        let mut differences = Vec::new();
        for module in modules {
            let a = perms_a.get(&module).copied().unwrap_or_default();
            let b = perms_b.get(&module).copied().unwrap_or_default();
            if a != b {
                differences.push(PermissionDifference { module, a, b });
            }
        }

        Ok(RoleComparison {
            role_a: ComparedRole {
                id: role_a.id,
                name: role_a.name,
                permissions: perms_a,
            },
            role_b: ComparedRole {
                id: role_b.id,
                name: role_b.name,
                permissions: perms_b,
            },
            differences,
        })
    }
}

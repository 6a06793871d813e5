//! Role domain model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WardenError;
use crate::models::permission::{Module, PermissionEntry, PermissionFlags};

/// How a role's own permissions combine with inherited ones when both
/// define the same module.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Flag-wise OR: grant if either side allows.
    #[default]
    Merge,
    /// The role's own flags replace the inherited ones.
    Override,
    /// The inherited flags win; the role's conflicting entry is dropped.
    Inherit,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::Merge => "merge",
            ConflictResolution::Override => "override",
            ConflictResolution::Inherit => "inherit",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(ConflictResolution::Merge),
            "override" => Ok(ConflictResolution::Override),
            "inherit" => Ok(ConflictResolution::Inherit),
            other => Err(WardenError::Validation {
                message: format!("unknown conflict resolution strategy: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Unique across all roles; immutable after creation.
    pub name: String,
    pub description: String,
    /// Weak by-id reference to the parent role, resolved through the
    /// store on each resolution. Never an owned pointer.
    pub parent_role_id: Option<Uuid>,
    /// At most one entry per module, guaranteed by the map form.
    pub permissions: BTreeMap<Module, PermissionFlags>,
    /// When false, the parent chain is never consulted.
    pub inherit_permissions: bool,
    pub conflict_resolution: ConflictResolution,
    /// Soft marker; not consulted during resolution.
    pub is_active: bool,
    /// Optimistic-concurrency version, starts at 1 and bumps on update.
    pub version: u64,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
    pub parent_role_id: Option<Uuid>,
    pub permissions: Vec<PermissionEntry>,
    pub inherit_permissions: bool,
    pub conflict_resolution: ConflictResolution,
    pub created_by: Option<Uuid>,
}

/// Field-enumerated update command.
///
/// `name` and `created_by` are deliberately absent: the name is
/// immutable and provenance cannot be rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRole {
    pub description: Option<String>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    pub parent_role_id: Option<Option<Uuid>>,
    pub permissions: Option<Vec<PermissionEntry>>,
    pub inherit_permissions: Option<bool>,
    pub conflict_resolution: Option<ConflictResolution>,
    pub is_active: Option<bool>,
    pub updated_by: Option<Uuid>,
    /// When set, the update only applies if the stored version matches;
    /// otherwise it fails with `ConcurrentModification`.
    pub expected_version: Option<u64>,
}

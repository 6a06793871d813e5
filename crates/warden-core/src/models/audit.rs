//! Audit log domain model.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WardenError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    UserAssigned,
    UserRemoved,
    BulkAssignment,
    RoleCompared,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RoleCreated => "ROLE_CREATED",
            AuditAction::RoleUpdated => "ROLE_UPDATED",
            AuditAction::RoleDeleted => "ROLE_DELETED",
            AuditAction::UserAssigned => "USER_ASSIGNED",
            AuditAction::UserRemoved => "USER_REMOVED",
            AuditAction::BulkAssignment => "BULK_ASSIGNMENT",
            AuditAction::RoleCompared => "ROLE_COMPARED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_CREATED" => Ok(AuditAction::RoleCreated),
            "ROLE_UPDATED" => Ok(AuditAction::RoleUpdated),
            "ROLE_DELETED" => Ok(AuditAction::RoleDeleted),
            "USER_ASSIGNED" => Ok(AuditAction::UserAssigned),
            "USER_REMOVED" => Ok(AuditAction::UserRemoved),
            "BULK_ASSIGNMENT" => Ok(AuditAction::BulkAssignment),
            "ROLE_COMPARED" => Ok(AuditAction::RoleCompared),
            other => Err(WardenError::Validation {
                message: format!("unknown audit action: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditEntityType {
    Role,
    User,
}

impl AuditEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntityType::Role => "Role",
            AuditEntityType::User => "User",
        }
    }
}

impl FromStr for AuditEntityType {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Role" => Ok(AuditEntityType::Role),
            "User" => Ok(AuditEntityType::User),
            other => Err(WardenError::Validation {
                message: format!("unknown audit entity type: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub performed_by: Uuid,
    pub target_user: Option<Uuid>,
    pub target_role: Option<Uuid>,
    /// Action-specific payload, e.g. before/after snapshots for updates.
    pub changes: serde_json::Value,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub performed_by: Uuid,
    pub target_user: Option<Uuid>,
    pub target_role: Option<Uuid>,
    pub changes: serde_json::Value,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Query filters for audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub performed_by: Option<Uuid>,
    pub target_user: Option<Uuid>,
    pub target_role: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

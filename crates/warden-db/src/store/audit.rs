//! SurrealDB implementation of [`AuditSink`].
//!
//! The `audit_event` table is append-only: no update or delete
//! queries exist in this module.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use warden_core::error::WardenResult;
use warden_core::models::audit::{
    AuditAction, AuditEntityType, AuditEvent, AuditFilter, NewAuditEvent,
};
use warden_core::store::{AuditSink, PaginatedResult, Pagination};

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AuditRow {
    action: String,
    entity_type: String,
    entity_id: String,
    performed_by: String,
    target_user: Option<String>,
    target_role: Option<String>,
    changes: serde_json::Value,
    metadata: serde_json::Value,
    description: String,
    created_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    action: String,
    entity_type: String,
    entity_id: String,
    performed_by: String,
    target_user: Option<String>,
    target_role: Option<String>,
    changes: serde_json::Value,
    metadata: serde_json::Value,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(s: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    s.map(|v| parse_uuid(v, what)).transpose()
}

impl AuditRow {
    fn into_event(self, id: Uuid) -> Result<AuditEvent, DbError> {
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|_| DbError::Decode(format!("invalid audit action: {}", self.action)))?;
        let entity_type: AuditEntityType = self.entity_type.parse().map_err(|_| {
            DbError::Decode(format!("invalid audit entity type: {}", self.entity_type))
        })?;
        Ok(AuditEvent {
            id,
            action,
            entity_type,
            entity_id: parse_uuid(&self.entity_id, "entity")?,
            performed_by: parse_uuid(&self.performed_by, "actor")?,
            target_user: parse_opt_uuid(self.target_user.as_deref(), "target user")?,
            target_role: parse_opt_uuid(self.target_role.as_deref(), "target role")?,
            changes: self.changes,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

impl AuditRowWithId {
    fn try_into_event(self) -> Result<AuditEvent, DbError> {
        let id = parse_uuid(&self.record_id, "audit event")?;
        AuditRow {
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            performed_by: self.performed_by,
            target_user: self.target_user,
            target_role: self.target_role,
            changes: self.changes,
            metadata: self.metadata,
            description: self.description,
            created_at: self.created_at,
        }
        .into_event(id)
    }
}

/// SurrealDB implementation of the audit sink.
#[derive(Clone)]
pub struct SurrealAuditSink<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditSink<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditSink for SurrealAuditSink<C> {
    async fn record(&self, input: NewAuditEvent) -> WardenResult<AuditEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_event', $id) SET \
                 action = $action, entity_type = $entity_type, \
                 entity_id = $entity_id, performed_by = $performed_by, \
                 target_user = $target_user, target_role = $target_role, \
                 changes = $changes, metadata = $metadata, \
                 description = $description",
            )
            .bind(("id", id_str.clone()))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("entity_type", input.entity_type.as_str().to_string()))
            .bind(("entity_id", input.entity_id.to_string()))
            .bind(("performed_by", input.performed_by.to_string()))
            .bind(("target_user", input.target_user.map(|u| u.to_string())))
            .bind(("target_role", input.target_role.map(|r| r.to_string())))
            .bind(("changes", input.changes))
            .bind(("metadata", input.metadata))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_event".into(),
            id: id_str,
        })?;

        Ok(row.into_event(id)?)
    }

    async fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<AuditEvent>> {
        let mut conditions = Vec::new();
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.performed_by.is_some() {
            conditions.push("performed_by = $performed_by");
        }
        if filter.target_user.is_some() {
            conditions.push("target_user = $target_user");
        }
        if filter.target_role.is_some() {
            conditions.push("target_role = $target_role");
        }
        if filter.from.is_some() {
            conditions.push("created_at >= $from");
        }
        if filter.to.is_some() {
            conditions.push("created_at <= $to");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT count() AS total FROM audit_event{where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_event{where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(action) = filter.action {
            builder = builder.bind(("action", action.as_str().to_string()));
        }
        if let Some(performed_by) = filter.performed_by {
            builder = builder.bind(("performed_by", performed_by.to_string()));
        }
        if let Some(target_user) = filter.target_user {
            builder = builder.bind(("target_user", target_user.to_string()));
        }
        if let Some(target_role) = filter.target_role {
            builder = builder.bind(("target_role", target_role.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

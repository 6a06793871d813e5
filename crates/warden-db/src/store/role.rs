//! SurrealDB implementation of [`RoleStore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{Module, PermissionEntry, PermissionFlags};
use warden_core::models::role::{ConflictResolution, CreateRole, Role, UpdateRole};
use warden_core::models::user::UserRef;
use warden_core::store::{PaginatedResult, Pagination, RoleStore};

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    module: String,
    read: bool,
    write: bool,
    delete: bool,
    admin: bool,
}

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RoleRow {
    name: String,
    description: String,
    parent_role_id: Option<String>,
    permissions: Vec<PermissionRow>,
    inherit_permissions: bool,
    conflict_resolution: String,
    is_active: bool,
    version: u64,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: String,
    name: String,
    description: String,
    parent_role_id: Option<String>,
    permissions: Vec<PermissionRow>,
    inherit_permissions: bool,
    conflict_resolution: String,
    is_active: bool,
    version: u64,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct UserRefRow {
    record_id: String,
    username: String,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(s: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    s.map(|v| parse_uuid(v, what)).transpose()
}

fn permission_rows(entries: &[PermissionEntry]) -> Vec<PermissionRow> {
    entries
        .iter()
        .map(|entry| PermissionRow {
            module: entry.module.as_str().to_string(),
            read: entry.flags.read,
            write: entry.flags.write,
            delete: entry.flags.delete,
            admin: entry.flags.admin,
        })
        .collect()
}

fn permission_map(rows: Vec<PermissionRow>) -> Result<BTreeMap<Module, PermissionFlags>, DbError> {
    let mut map = BTreeMap::new();
    for row in rows {
        let module: Module = row
            .module
            .parse()
            .map_err(|_| DbError::Decode(format!("invalid module: {}", row.module)))?;
        map.insert(
            module,
            PermissionFlags {
                read: row.read,
                write: row.write,
                delete: row.delete,
                admin: row.admin,
            },
        );
    }
    Ok(map)
}

impl RoleRow {
    fn into_role(self, id: Uuid) -> Result<Role, DbError> {
        let conflict_resolution: ConflictResolution =
            self.conflict_resolution.parse().map_err(|_| {
                DbError::Decode(format!(
                    "invalid conflict resolution: {}",
                    self.conflict_resolution
                ))
            })?;
        Ok(Role {
            id,
            name: self.name,
            description: self.description,
            parent_role_id: parse_opt_uuid(self.parent_role_id.as_deref(), "parent role")?,
            permissions: permission_map(self.permissions)?,
            inherit_permissions: self.inherit_permissions,
            conflict_resolution,
            is_active: self.is_active,
            version: self.version,
            created_by: parse_opt_uuid(self.created_by.as_deref(), "created_by")?,
            updated_by: parse_opt_uuid(self.updated_by.as_deref(), "updated_by")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        let id = parse_uuid(&self.record_id, "role")?;
        RoleRow {
            name: self.name,
            description: self.description,
            parent_role_id: self.parent_role_id,
            permissions: self.permissions,
            inherit_permissions: self.inherit_permissions,
            conflict_resolution: self.conflict_resolution,
            is_active: self.is_active,
            version: self.version,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_role(id)
    }
}

/// SurrealDB implementation of the role store.
#[derive(Clone)]
pub struct SurrealRoleStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleStore for SurrealRoleStore<C> {
    async fn create(&self, input: CreateRole) -> WardenResult<Role> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('role', $id) SET \
                 name = $name, description = $description, \
                 parent_role_id = $parent_role_id, \
                 permissions = $permissions, \
                 inherit_permissions = $inherit_permissions, \
                 conflict_resolution = $conflict_resolution, \
                 is_active = true, version = 1, \
                 created_by = $created_by, updated_by = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind((
                "parent_role_id",
                input.parent_role_id.map(|p| p.to_string()),
            ))
            .bind(("permissions", permission_rows(&input.permissions)))
            .bind(("inherit_permissions", input.inherit_permissions))
            .bind((
                "conflict_resolution",
                input.conflict_resolution.as_str().to_string(),
            ))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('role', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn find_by_name(&self, name: &str) -> WardenResult<Role> {
        let name = name.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE name = $name",
            )
            .bind(("name", name.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "role".into(),
            id: name,
        })?;

        Ok(row.try_into_role()?)
    }

    async fn update(&self, id: Uuid, input: UpdateRole) -> WardenResult<Role> {
        let id_str = id.to_string();

        // Fetch first so a missing role surfaces as NotFound rather
        // than a version conflict.
        let current = self.get_by_id(id).await?;
        let guard_version = match input.expected_version {
            Some(expected) if expected != current.version => {
                return Err(WardenError::ConcurrentModification {
                    entity: "role".into(),
                    id: id_str,
                });
            }
            Some(expected) => expected,
            None => current.version,
        };

        let mut sets = Vec::new();
        if input.description.is_some() {
            sets.push("description = $description");
        }
        match input.parent_role_id {
            Some(Some(_)) => sets.push("parent_role_id = $parent_role_id"),
            Some(None) => sets.push("parent_role_id = NONE"),
            None => {}
        }
        if input.permissions.is_some() {
            sets.push("permissions = $permissions");
        }
        if input.inherit_permissions.is_some() {
            sets.push("inherit_permissions = $inherit_permissions");
        }
        if input.conflict_resolution.is_some() {
            sets.push("conflict_resolution = $conflict_resolution");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.updated_by.is_some() {
            sets.push("updated_by = $updated_by");
        }
        sets.push("version = version + 1");
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE version = $guard_version",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("guard_version", guard_version));

        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(Some(parent_id)) = input.parent_role_id {
            builder = builder.bind(("parent_role_id", parent_id.to_string()));
        }
        if let Some(permissions) = input.permissions {
            builder = builder.bind(("permissions", permission_rows(&permissions)));
        }
        if let Some(inherit_permissions) = input.inherit_permissions {
            builder = builder.bind(("inherit_permissions", inherit_permissions));
        }
        if let Some(conflict_resolution) = input.conflict_resolution {
            builder = builder.bind((
                "conflict_resolution",
                conflict_resolution.as_str().to_string(),
            ));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(updated_by) = input.updated_by {
            builder = builder.bind(("updated_by", updated_by.to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        // The role exists; an empty result means the version guard lost
        // a race with a concurrent writer.
        let row = rows
            .into_iter()
            .next()
            .ok_or(WardenError::ConcurrentModification {
                entity: "role".into(),
                id: id_str,
            })?;

        Ok(row.into_role(id)?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.db
            .query("DELETE type::record('role', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<Role>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM role GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn find_users_with_role(&self, role_id: Uuid) -> WardenResult<Vec<UserRef>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, username FROM user \
                 WHERE assigned_roles CONTAINS $role_id \
                 ORDER BY username ASC",
            )
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRefRow> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| {
                Ok(UserRef {
                    id: parse_uuid(&row.record_id, "user")?,
                    username: row.username,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(WardenError::from)
    }

    async fn detach_role_from_all_users(&self, role_id: Uuid) -> WardenResult<u64> {
        let role_id_str = role_id.to_string();

        // Count holders first, then strip the reference. Removing an
        // already-removed reference matches nothing, so re-running
        // after a partial failure is safe.
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE assigned_roles CONTAINS $role_id GROUP ALL; \
                 UPDATE user SET assigned_roles -= $role_id, \
                 updated_at = time::now() \
                 WHERE assigned_roles CONTAINS $role_id;",
            )
            .bind(("role_id", role_id_str))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count_rows.first().map(|r| r.total).unwrap_or(0))
    }
}

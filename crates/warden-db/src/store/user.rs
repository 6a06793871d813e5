//! SurrealDB implementation of [`UserStore`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use warden_core::error::WardenResult;
use warden_core::models::user::{CreateUser, User};
use warden_core::store::{PaginatedResult, Pagination, UserStore};

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    assigned_roles: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    username: String,
    email: String,
    assigned_roles: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_role_ids(values: Vec<String>) -> Result<Vec<Uuid>, DbError> {
    values
        .into_iter()
        .map(|v| {
            Uuid::parse_str(&v).map_err(|e| DbError::Decode(format!("invalid role UUID: {e}")))
        })
        .collect()
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            assigned_roles: parse_role_ids(self.assigned_roles)?,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        UserRow {
            username: self.username,
            email: self.email,
            assigned_roles: self.assigned_roles,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// SurrealDB implementation of the user store.
#[derive(Clone)]
pub struct SurrealUserStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserStore for SurrealUserStore<C> {
    async fn create(&self, input: CreateUser) -> WardenResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 assigned_roles = [], is_active = true",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.db
            .query("DELETE type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY username ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_role(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<bool> {
        // NotFound for a missing user; the membership check below is
        // repeated query-side so concurrent adds cannot double-insert.
        let user = self.get_by_id(user_id).await?;
        if user.assigned_roles.contains(&role_id) {
            return Ok(false);
        }

        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 assigned_roles += $role_id, updated_at = time::now() \
                 WHERE !(assigned_roles CONTAINS $role_id)",
            )
            .bind(("id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<bool> {
        let user = self.get_by_id(user_id).await?;
        if !user.assigned_roles.contains(&role_id) {
            return Ok(false);
        }

        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 assigned_roles -= $role_id, updated_at = time::now() \
                 WHERE assigned_roles CONTAINS $role_id",
            )
            .bind(("id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }
}

//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Audit `changes`/`metadata`
//! payloads are stored as flexible objects.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Roles
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD description ON TABLE role TYPE string;
DEFINE FIELD parent_role_id ON TABLE role TYPE option<string>;
DEFINE FIELD permissions ON TABLE role TYPE array<object> DEFAULT [];
DEFINE FIELD permissions.*.module ON TABLE role TYPE string \
    ASSERT $value IN ['users', 'roles', 'content', 'settings', \
    'reports', 'analytics', 'billing', 'support'];
DEFINE FIELD permissions.*.read ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD permissions.*.write ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD permissions.*.delete ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD permissions.*.admin ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD inherit_permissions ON TABLE role TYPE bool DEFAULT true;
DEFINE FIELD conflict_resolution ON TABLE role TYPE string \
    ASSERT $value IN ['merge', 'override', 'inherit'];
DEFINE FIELD is_active ON TABLE role TYPE bool DEFAULT true;
DEFINE FIELD version ON TABLE role TYPE int DEFAULT 1;
DEFINE FIELD created_by ON TABLE role TYPE option<string>;
DEFINE FIELD updated_by ON TABLE role TYPE option<string>;
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;

-- =======================================================================
-- Users (role-assignment holders; credentials live elsewhere)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string \
    ASSERT string::len($value) >= 3;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD assigned_roles ON TABLE user TYPE array<string> \
    DEFAULT [];
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Audit events (append-only)
-- =======================================================================
DEFINE TABLE audit_event SCHEMAFULL;
DEFINE FIELD action ON TABLE audit_event TYPE string \
    ASSERT $value IN ['ROLE_CREATED', 'ROLE_UPDATED', 'ROLE_DELETED', \
    'USER_ASSIGNED', 'USER_REMOVED', 'BULK_ASSIGNMENT', \
    'ROLE_COMPARED'];
DEFINE FIELD entity_type ON TABLE audit_event TYPE string \
    ASSERT $value IN ['Role', 'User'];
DEFINE FIELD entity_id ON TABLE audit_event TYPE string;
DEFINE FIELD performed_by ON TABLE audit_event TYPE string;
DEFINE FIELD target_user ON TABLE audit_event TYPE option<string>;
DEFINE FIELD target_role ON TABLE audit_event TYPE option<string>;
DEFINE FIELD changes ON TABLE audit_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD metadata ON TABLE audit_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD description ON TABLE audit_event TYPE string;
DEFINE FIELD created_at ON TABLE audit_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_action ON TABLE audit_event \
    COLUMNS action, created_at;
DEFINE INDEX idx_audit_actor ON TABLE audit_event \
    COLUMNS performed_by, created_at;
DEFINE INDEX idx_audit_target_user ON TABLE audit_event \
    COLUMNS target_user, created_at;
DEFINE INDEX idx_audit_target_role ON TABLE audit_event \
    COLUMNS target_role, created_at;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

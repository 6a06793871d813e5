//! Integration tests for the role service: mutations, cascades, and
//! audit emission, using in-memory SurrealDB stores.

use serde_json::json;
use surrealdb::engine::local::Db;
use uuid::Uuid;

use warden_core::error::{WardenError, WardenResult};
use warden_core::models::audit::{AuditAction, AuditEvent, AuditFilter, NewAuditEvent};
use warden_core::models::permission::{Module, PermissionAction, PermissionEntry, PermissionFlags};
use warden_core::models::role::{ConflictResolution, CreateRole, UpdateRole};
use warden_core::models::user::{CreateUser, User};
use warden_core::store::{AuditSink, PaginatedResult, Pagination, RoleStore, UserStore};
use warden_db::{DbManager, SurrealAuditSink, SurrealRoleStore, SurrealUserStore};
use warden_rbac::{AssignOutcome, RoleService, UserPermissionAggregator};

type Service = RoleService<SurrealRoleStore<Db>, SurrealUserStore<Db>, SurrealAuditSink<Db>>;

async fn setup() -> (
    Service,
    SurrealRoleStore<Db>,
    SurrealUserStore<Db>,
    SurrealAuditSink<Db>,
) {
    let manager = DbManager::memory().await.unwrap();
    let db = manager.client().clone();

    let roles = SurrealRoleStore::new(db.clone());
    let users = SurrealUserStore::new(db.clone());
    let audit = SurrealAuditSink::new(db);
    let service = RoleService::new(roles.clone(), users.clone(), audit.clone());
    (service, roles, users, audit)
}

fn admin() -> Uuid {
    Uuid::new_v4()
}

fn flags(read: bool, write: bool, delete: bool, admin: bool) -> PermissionFlags {
    PermissionFlags {
        read,
        write,
        delete,
        admin,
    }
}

fn role_input(name: &str, parent: Option<Uuid>) -> CreateRole {
    CreateRole {
        name: name.into(),
        description: format!("{name} role"),
        parent_role_id: parent,
        permissions: vec![PermissionEntry {
            module: Module::Content,
            flags: flags(true, false, false, false),
        }],
        inherit_permissions: true,
        conflict_resolution: ConflictResolution::Merge,
        created_by: None,
    }
}

async fn create_user(users: &SurrealUserStore<Db>, username: &str) -> User {
    users
        .create(CreateUser {
            username: username.into(),
            email: format!("{username}@example.com"),
        })
        .await
        .unwrap()
}

async fn events_for(audit: &SurrealAuditSink<Db>, action: AuditAction) -> Vec<AuditEvent> {
    audit
        .list(
            AuditFilter {
                action: Some(action),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap()
        .items
}

// -----------------------------------------------------------------------
// Role CRUD
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_role_records_actor_and_audits() {
    let (service, _roles, _users, audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    assert_eq!(role.created_by, Some(actor));

    let events = events_for(&audit, AuditAction::RoleCreated).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].performed_by, actor);
    assert_eq!(events[0].target_role, Some(role.id));
    assert!(events[0].description.contains("editors"));
}

#[tokio::test]
async fn create_role_rejects_duplicate_name() {
    let (service, _roles, _users, audit) = setup().await;

    service
        .create_role(admin(), role_input("editors", None))
        .await
        .unwrap();
    let err = service
        .create_role(admin(), role_input("editors", None))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }));

    // Only the first create was audited.
    assert_eq!(events_for(&audit, AuditAction::RoleCreated).await.len(), 1);
}

#[tokio::test]
async fn create_role_rejects_bad_input() {
    let (service, _roles, _users, _audit) = setup().await;

    let err = service
        .create_role(
            admin(),
            CreateRole {
                name: "  ".into(),
                ..role_input("blank", None)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }));

    let err = service
        .create_role(
            admin(),
            CreateRole {
                description: "d".repeat(501),
                ..role_input("verbose", None)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }));

    let err = service
        .create_role(
            admin(),
            CreateRole {
                permissions: vec![
                    PermissionEntry {
                        module: Module::Content,
                        flags: PermissionFlags::default(),
                    },
                    PermissionEntry {
                        module: Module::Content,
                        flags: PermissionFlags::default(),
                    },
                ],
                ..role_input("doubled", None)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }));
}

#[tokio::test]
async fn create_role_requires_existing_parent() {
    let (service, _roles, _users, _audit) = setup().await;

    let err = service
        .create_role(admin(), role_input("orphan", Some(Uuid::new_v4())))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn update_role_audits_with_snapshots() {
    let (service, _roles, _users, audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    let updated = service
        .update_role(
            actor,
            role.id,
            UpdateRole {
                description: Some("senior editors".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "senior editors");
    assert_eq!(updated.updated_by, Some(actor));

    let events = events_for(&audit, AuditAction::RoleUpdated).await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes["before"]["description"],
        json!("editors role")
    );
    assert_eq!(
        events[0].changes["after"]["description"],
        json!("senior editors")
    );
}

#[tokio::test]
async fn update_surfaces_version_conflict() {
    let (service, _roles, _users, _audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    service
        .update_role(
            actor,
            role.id,
            UpdateRole {
                description: Some("first".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = service
        .update_role(
            actor,
            role.id,
            UpdateRole {
                description: Some("second".into()),
                expected_version: Some(role.version),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::ConcurrentModification { .. }));
}

#[tokio::test]
async fn cyclic_update_is_rejected_and_roles_unchanged() {
    let (service, roles, _users, _audit) = setup().await;
    let actor = admin();

    let a = service
        .create_role(actor, role_input("role-a", None))
        .await
        .unwrap();
    let b = service
        .create_role(actor, role_input("role-b", Some(a.id)))
        .await
        .unwrap();

    // A -> B -> A would loop.
    let err = service
        .update_role(
            actor,
            a.id,
            UpdateRole {
                parent_role_id: Some(Some(b.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::CycleDetected { .. }));

    let a_now = roles.get_by_id(a.id).await.unwrap();
    assert_eq!(a_now.parent_role_id, None);
    assert_eq!(a_now.version, a.version);
    let b_now = roles.get_by_id(b.id).await.unwrap();
    assert_eq!(b_now.parent_role_id, Some(a.id));
}

#[tokio::test]
async fn self_parent_is_rejected() {
    let (service, _roles, _users, _audit) = setup().await;
    let actor = admin();

    let a = service
        .create_role(actor, role_input("role-a", None))
        .await
        .unwrap();
    let err = service
        .update_role(
            actor,
            a.id,
            UpdateRole {
                parent_role_id: Some(Some(a.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::CycleDetected { .. }));
}

#[tokio::test]
async fn get_role_includes_effective_permissions() {
    let (service, _roles, _users, _audit) = setup().await;
    let actor = admin();

    let parent = service
        .create_role(actor, role_input("parent", None))
        .await
        .unwrap();
    let mut child_input = role_input("child", Some(parent.id));
    child_input.permissions = vec![PermissionEntry {
        module: Module::Content,
        flags: flags(false, true, false, false),
    }];
    let child = service.create_role(actor, child_input).await.unwrap();

    let details = service.get_role(child.id).await.unwrap();
    assert_eq!(details.role.id, child.id);
    assert_eq!(
        details.effective_permissions[&Module::Content],
        flags(true, true, false, false)
    );
}

// -----------------------------------------------------------------------
// Assignments
// -----------------------------------------------------------------------

#[tokio::test]
async fn assign_reports_already_assigned_without_extra_audit() {
    let (service, _roles, users, audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    let alice = create_user(&users, "alice").await;

    let first = service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();
    assert_eq!(first, AssignOutcome::Assigned);

    let second = service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();
    assert_eq!(second, AssignOutcome::AlreadyAssigned);

    let events = events_for(&audit, AuditAction::UserAssigned).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target_user, Some(alice.id));
    assert_eq!(events[0].target_role, Some(role.id));
}

#[tokio::test]
async fn remove_role_is_noop_when_absent() {
    let (service, _roles, users, audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    let alice = create_user(&users, "alice").await;

    assert!(
        !service
            .remove_role_from_user(actor, role.id, alice.id)
            .await
            .unwrap()
    );

    service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();
    assert!(
        service
            .remove_role_from_user(actor, role.id, alice.id)
            .await
            .unwrap()
    );

    assert_eq!(events_for(&audit, AuditAction::UserRemoved).await.len(), 1);
}

#[tokio::test]
async fn bulk_assign_is_idempotent_and_counts_modified() {
    let (service, _roles, users, audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    let alice = create_user(&users, "alice").await;
    let bob = create_user(&users, "bob").await;
    let carol = create_user(&users, "carol").await;

    // Alice already holds the role.
    service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();

    let targets = vec![alice.id, bob.id, carol.id, Uuid::new_v4()];
    let count = service
        .bulk_assign_role(actor, role.id, &targets)
        .await
        .unwrap();
    assert_eq!(count, 2);

    // Re-running modifies nobody.
    let again = service
        .bulk_assign_role(actor, role.id, &targets)
        .await
        .unwrap();
    assert_eq!(again, 0);

    let events = events_for(&audit, AuditAction::BulkAssignment).await;
    assert_eq!(events.len(), 2);

    let holders = service.users_with_role(role.id).await.unwrap();
    assert_eq!(holders.len(), 3);
}

// -----------------------------------------------------------------------
// Deletion cascade
// -----------------------------------------------------------------------

#[tokio::test]
async fn delete_role_cascades_and_shrinks_user_permissions() {
    let (service, roles, users, audit) = setup().await;
    let actor = admin();

    let keep = service
        .create_role(actor, role_input("keep", None))
        .await
        .unwrap();
    let mut doomed_input = role_input("doomed", None);
    doomed_input.permissions = vec![PermissionEntry {
        module: Module::Billing,
        flags: flags(false, false, false, true),
    }];
    let doomed = service.create_role(actor, doomed_input).await.unwrap();

    let alice = create_user(&users, "alice").await;
    service
        .assign_role_to_user(actor, keep.id, alice.id)
        .await
        .unwrap();
    service
        .assign_role_to_user(actor, doomed.id, alice.id)
        .await
        .unwrap();

    service.delete_role(actor, doomed.id).await.unwrap();

    assert!(matches!(
        roles.get_by_id(doomed.id).await.unwrap_err(),
        WardenError::NotFound { .. }
    ));
    let alice_now = users.get_by_id(alice.id).await.unwrap();
    assert!(!alice_now.assigned_roles.contains(&doomed.id));

    // Permissions uniquely granted through the deleted role are gone.
    let aggregator = UserPermissionAggregator::new(roles, users);
    let aggregate = aggregator.resolve_user_permissions(alice.id).await.unwrap();
    assert!(!aggregate.contains_key(&Module::Billing));
    assert!(aggregate.contains_key(&Module::Content));

    let events = events_for(&audit, AuditAction::RoleDeleted).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].changes["detached_users"], json!(1));
}

// -----------------------------------------------------------------------
// Comparison auditing
// -----------------------------------------------------------------------

#[tokio::test]
async fn compare_roles_audits_the_comparison() {
    let (service, _roles, _users, audit) = setup().await;
    let actor = admin();

    let a = service
        .create_role(actor, role_input("role-a", None))
        .await
        .unwrap();
    let b = service
        .create_role(actor, role_input("role-b", None))
        .await
        .unwrap();

    let comparison = service.compare_roles(actor, a.id, b.id).await.unwrap();
    assert!(comparison.differences.is_empty());

    let events = events_for(&audit, AuditAction::RoleCompared).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].description.contains("role-a"));
    assert!(events[0].description.contains("role-b"));
}

// -----------------------------------------------------------------------
// Audit failures never break the primary action
// -----------------------------------------------------------------------

#[derive(Clone)]
struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    async fn record(&self, _input: NewAuditEvent) -> WardenResult<AuditEvent> {
        Err(WardenError::Database("audit store offline".into()))
    }

    async fn list(
        &self,
        _filter: AuditFilter,
        _pagination: Pagination,
    ) -> WardenResult<PaginatedResult<AuditEvent>> {
        Err(WardenError::Database("audit store offline".into()))
    }
}

#[tokio::test]
async fn audit_write_failure_does_not_fail_the_mutation() {
    let manager = DbManager::memory().await.unwrap();
    let db = manager.client().clone();

    let roles = SurrealRoleStore::new(db.clone());
    let users = SurrealUserStore::new(db.clone());
    let service = RoleService::new(roles.clone(), users.clone(), FailingAuditSink);
    let actor = admin();

    let role = service
        .create_role(actor, role_input("editors", None))
        .await
        .unwrap();
    let alice = create_user(&users, "alice").await;

    let outcome = service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();
    assert_eq!(outcome, AssignOutcome::Assigned);

    service.delete_role(actor, role.id).await.unwrap();
}

// -----------------------------------------------------------------------
// Read paths
// -----------------------------------------------------------------------

#[tokio::test]
async fn list_roles_paginates() {
    let (service, _roles, _users, _audit) = setup().await;
    let actor = admin();

    for i in 0..3 {
        service
            .create_role(actor, role_input(&format!("role-{i}"), None))
            .await
            .unwrap();
    }

    let page = service
        .list_roles(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn users_with_role_requires_existing_role() {
    let (service, _roles, _users, _audit) = setup().await;

    let err = service.users_with_role(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn has_permission_matches_direct_flag_grants() {
    let (service, roles, users, _audit) = setup().await;
    let actor = admin();

    let role = service
        .create_role(actor, role_input("readers", None))
        .await
        .unwrap();
    let alice = create_user(&users, "alice").await;
    service
        .assign_role_to_user(actor, role.id, alice.id)
        .await
        .unwrap();

    let aggregator = UserPermissionAggregator::new(roles, users);
    assert!(
        aggregator
            .has_permission(alice.id, Module::Content, PermissionAction::Read)
            .await
            .unwrap()
    );
    assert!(
        !aggregator
            .has_permission(alice.id, Module::Content, PermissionAction::Admin)
            .await
            .unwrap()
    );
}

//! Integration tests for the audit sink using in-memory SurrealDB.

use serde_json::json;
use surrealdb::engine::local::Db;
use uuid::Uuid;

use warden_core::models::audit::{AuditAction, AuditEntityType, AuditFilter, NewAuditEvent};
use warden_core::store::{AuditSink, Pagination};
use warden_db::{DbManager, SurrealAuditSink};

async fn setup() -> SurrealAuditSink<Db> {
    let manager = DbManager::memory().await.unwrap();
    SurrealAuditSink::new(manager.client().clone())
}

fn event(action: AuditAction, performed_by: Uuid, target_role: Option<Uuid>) -> NewAuditEvent {
    NewAuditEvent {
        action,
        entity_type: AuditEntityType::Role,
        entity_id: target_role.unwrap_or_else(Uuid::new_v4),
        performed_by,
        target_user: None,
        target_role,
        changes: json!({}),
        description: format!("{} event", action.as_str()),
        metadata: json!({}),
    }
}

#[tokio::test]
async fn record_round_trips() {
    let audit = setup().await;

    let actor = Uuid::new_v4();
    let role = Uuid::new_v4();
    let recorded = audit
        .record(NewAuditEvent {
            changes: json!({ "detached_users": 2 }),
            ..event(AuditAction::RoleDeleted, actor, Some(role))
        })
        .await
        .unwrap();

    assert_eq!(recorded.action, AuditAction::RoleDeleted);
    assert_eq!(recorded.entity_type, AuditEntityType::Role);
    assert_eq!(recorded.performed_by, actor);
    assert_eq!(recorded.target_role, Some(role));
    assert_eq!(recorded.changes, json!({ "detached_users": 2 }));
}

#[tokio::test]
async fn list_filters_by_action_and_actor() {
    let audit = setup().await;

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    audit
        .record(event(AuditAction::RoleCreated, alice, None))
        .await
        .unwrap();
    audit
        .record(event(AuditAction::RoleUpdated, alice, None))
        .await
        .unwrap();
    audit
        .record(event(AuditAction::RoleCreated, bob, None))
        .await
        .unwrap();

    let created = audit
        .list(
            AuditFilter {
                action: Some(AuditAction::RoleCreated),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(created.total, 2);

    let by_alice = audit
        .list(
            AuditFilter {
                performed_by: Some(alice),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_alice.total, 2);

    let alice_created = audit
        .list(
            AuditFilter {
                action: Some(AuditAction::RoleCreated),
                performed_by: Some(alice),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(alice_created.total, 1);
}

#[tokio::test]
async fn list_filters_by_target_user() {
    let audit = setup().await;

    let actor = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for target in [alice, alice, bob] {
        audit
            .record(NewAuditEvent {
                target_user: Some(target),
                ..event(AuditAction::UserAssigned, actor, Some(Uuid::new_v4()))
            })
            .await
            .unwrap();
    }

    let for_alice = audit
        .list(
            AuditFilter {
                target_user: Some(alice),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(for_alice.total, 2);
    assert!(for_alice.items.iter().all(|e| e.target_user == Some(alice)));
}

#[tokio::test]
async fn list_filters_by_target_role_and_paginates() {
    let audit = setup().await;

    let actor = Uuid::new_v4();
    let role = Uuid::new_v4();
    for _ in 0..3 {
        audit
            .record(event(AuditAction::UserAssigned, actor, Some(role)))
            .await
            .unwrap();
    }
    audit
        .record(event(AuditAction::UserAssigned, actor, Some(Uuid::new_v4())))
        .await
        .unwrap();

    let page = audit
        .list(
            AuditFilter {
                target_role: Some(role),
                ..Default::default()
            },
            Pagination {
                offset: 0,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|e| e.target_role == Some(role)));
}

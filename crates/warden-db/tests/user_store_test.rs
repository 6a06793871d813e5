//! Integration tests for the user store using in-memory SurrealDB.

use surrealdb::engine::local::Db;
use uuid::Uuid;

use warden_core::error::WardenError;
use warden_core::models::user::CreateUser;
use warden_core::store::{Pagination, UserStore};
use warden_db::{DbManager, SurrealUserStore};

async fn setup() -> SurrealUserStore<Db> {
    let manager = DbManager::memory().await.unwrap();
    SurrealUserStore::new(manager.client().clone())
}

fn user_input(username: &str) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: format!("{username}@example.com"),
    }
}

#[tokio::test]
async fn create_and_fetch_user() {
    let users = setup().await;

    let created = users.create(user_input("alice")).await.unwrap();
    assert_eq!(created.username, "alice");
    assert!(created.assigned_roles.is_empty());
    assert!(created.is_active);

    let fetched = users.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.email, "alice@example.com");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let users = setup().await;

    let err = users.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn add_role_is_idempotent() {
    let users = setup().await;

    let user = users.create(user_input("alice")).await.unwrap();
    let role_id = Uuid::new_v4();

    assert!(users.add_role(user.id, role_id).await.unwrap());
    // Second add is a no-op.
    assert!(!users.add_role(user.id, role_id).await.unwrap());

    let fetched = users.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched.assigned_roles, vec![role_id]);
}

#[tokio::test]
async fn remove_role_reports_whether_present() {
    let users = setup().await;

    let user = users.create(user_input("alice")).await.unwrap();
    let role_id = Uuid::new_v4();

    // Removing an absent reference is a no-op.
    assert!(!users.remove_role(user.id, role_id).await.unwrap());

    users.add_role(user.id, role_id).await.unwrap();
    assert!(users.remove_role(user.id, role_id).await.unwrap());

    let fetched = users.get_by_id(user.id).await.unwrap();
    assert!(fetched.assigned_roles.is_empty());
}

#[tokio::test]
async fn delete_removes_user() {
    let users = setup().await;

    let user = users.create(user_input("alice")).await.unwrap();
    users.delete(user.id).await.unwrap();

    let err = users.get_by_id(user.id).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn list_orders_by_username() {
    let users = setup().await;

    users.create(user_input("carol")).await.unwrap();
    users.create(user_input("alice")).await.unwrap();
    users.create(user_input("bob")).await.unwrap();

    let page = users.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 3);
    let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

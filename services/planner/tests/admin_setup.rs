//! Role administration and first-run setup against an in-memory store.

use planner_core::{DocumentStore, Role};
use planner_lib::adapters::SqliteDocumentStore;
use planner_lib::error::AppError;
use planner_lib::services::{AdminService, NewProfile, SetupOutcome, SetupService, UserService};
use std::sync::Arc;

async fn store() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::in_memory().await.unwrap())
}

async fn add_user(users: &UserService, id: &str, first: &str, last: &str, role: Role) {
    users
        .save_user_info(
            id,
            NewProfile {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}@x.com", id),
                role: Some(role),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn first_user_becomes_admin_only_once() {
    let store = store().await;
    let setup = SetupService::new(store.clone());
    assert_eq!(setup.ensure_admin_exists().await.unwrap(), SetupOutcome::NoUsers);

    let users = UserService::new(store.clone());
    add_user(&users, "u1", "Ana", "Lee", Role::User).await;
    add_user(&users, "u2", "Bo", "Kim", Role::User).await;

    assert_eq!(
        setup.ensure_admin_exists().await.unwrap(),
        SetupOutcome::Promoted {
            user_id: "u1".to_string()
        }
    );
    assert_eq!(setup.ensure_admin_exists().await.unwrap(), SetupOutcome::AdminPresent);

    let stats = AdminService::new(store.clone()).get_user_stats().await.unwrap();
    assert_eq!((stats.total, stats.admin, stats.user), (2, 1, 1));
}

#[tokio::test]
async fn demo_users_and_sample_members() {
    let store = store().await;
    let setup = SetupService::new(store.clone());
    assert_eq!(setup.create_demo_users().await.unwrap(), 5);

    let admin = AdminService::new(store.clone());
    let before = admin.get_user_stats().await.unwrap();
    assert_eq!(before.total, 5);
    assert_eq!(before.user, 2);

    assert_eq!(setup.create_sample_members(&[]).await.unwrap(), 2);
    let after = admin.get_user_stats().await.unwrap();
    assert_eq!(after.user, 0);
    assert_eq!(after.member, 4);
}

#[tokio::test]
async fn promotions_demotions_and_role_listings() {
    let store = store().await;
    let users = UserService::new(store.clone());
    let admin = AdminService::new(store.clone());
    add_user(&users, "u1", "Ana", "Zed", Role::User).await;
    add_user(&users, "u2", "Bo", "Adams", Role::User).await;

    admin.promote_to_member("u1").await.unwrap();
    admin.promote_to_member("u2").await.unwrap();
    let members: Vec<String> = admin
        .get_users_by_role(Role::Member)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.last_name)
        .collect();
    assert_eq!(members, vec!["Adams", "Zed"]);

    admin.promote_to_admin("u1").await.unwrap();
    assert!(matches!(
        admin.demote_user("u1", "owner").await,
        Err(AppError::InvalidArgument(_))
    ));
    admin.demote_user("u1", "user").await.unwrap();

    let mentors: Vec<String> = users
        .get_mentors()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(mentors, vec!["u2"]);
}

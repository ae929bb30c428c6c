//! End-to-end checks of registration, login and the single-active-session
//! rule against an in-memory document store.

use async_trait::async_trait;
use planner_core::{
    ClientStorage, Document, DocumentStore, PortError, PortResult, Query, Role, SetOptions,
    SnapshotStream, WatchTarget,
};
use planner_lib::adapters::{MemoryClientStorage, SqliteDocumentStore};
use planner_lib::error::AppError;
use planner_lib::services::session::{EMAIL_KEY, PROFILE_KEY, TOKEN_KEY};
use planner_lib::services::{AccountService, SessionService, UserService};
use serde_json::{json, Value};
use std::sync::Arc;

struct Client {
    session: SessionService,
    storage: Arc<MemoryClientStorage>,
}

async fn store() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::in_memory().await.unwrap())
}

fn client(store: &Arc<dyn DocumentStore>) -> Client {
    let storage = Arc::new(MemoryClientStorage::new());
    let session = SessionService::new(
        AccountService::new(store.clone()),
        UserService::new(store.clone()),
        storage.clone(),
    );
    Client { session, storage }
}

#[tokio::test]
async fn newer_login_invalidates_older_session() {
    let store = store().await;
    let accounts = AccountService::new(store.clone());
    accounts.register("a@x.com", "secret1", "Ana", "Lee").await.unwrap();

    let laptop = client(&store);
    let phone = client(&store);

    let first = laptop.session.login("a@x.com", "secret1").await.unwrap();
    assert!(
        laptop
            .session
            .validate_session(Some(first.token.as_str()), Some("a@x.com"))
            .await
    );

    let second = phone.session.login("a@x.com", "secret1").await.unwrap();
    assert_ne!(first.token, second.token);

    // The laptop still caches the first token, which no longer matches.
    assert!(!laptop.session.check_session().await);
    assert_eq!(laptop.storage.get(TOKEN_KEY), None);
    assert_eq!(laptop.storage.get(EMAIL_KEY), None);

    assert!(phone.session.check_session().await);
    assert_eq!(phone.session.require_session().await.unwrap(), "a@x.com");
}

#[tokio::test]
async fn missing_token_is_never_valid() {
    let store = store().await;
    let c = client(&store);
    c.storage.set(EMAIL_KEY, "a@x.com");

    assert!(!c.session.validate_session(None, Some("a@x.com")).await);
    assert!(!c.session.validate_session(Some(""), Some("a@x.com")).await);
    assert!(!c.session.check_session().await);
    assert_eq!(c.storage.get(EMAIL_KEY), None);
    assert!(matches!(
        c.session.require_session().await,
        Err(AppError::SessionInvalid)
    ));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_rejected() {
    let store = store().await;
    AccountService::new(store.clone())
        .register("a@x.com", "secret1", "Ana", "Lee")
        .await
        .unwrap();
    let c = client(&store);

    assert!(matches!(
        c.session.login("a@x.com", "wrong").await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(matches!(
        c.session.login("nobody@x.com", "secret1").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(c.storage.get(TOKEN_KEY), None);
}

#[tokio::test]
async fn logout_clears_the_stored_token() {
    let store = store().await;
    let accounts = AccountService::new(store.clone());
    accounts.register("a@x.com", "secret1", "Ana", "Lee").await.unwrap();
    let c = client(&store);

    let outcome = c.session.login("a@x.com", "secret1").await.unwrap();
    c.session.refresh_profile(&outcome.account_id).await.unwrap();
    assert!(c.session.cached_profile().is_some());

    c.session.logout().await;
    assert_eq!(c.storage.get(TOKEN_KEY), None);
    assert!(c.session.cached_profile().is_none());

    let account = accounts.find_by_email("a@x.com").await.unwrap().unwrap();
    assert!(account.token.is_empty());
    assert!(
        !c.session
            .validate_session(Some(outcome.token.as_str()), Some("a@x.com"))
            .await
    );
}

#[tokio::test]
async fn registration_creates_a_user_profile_and_rejects_duplicates() {
    let store = store().await;
    let accounts = AccountService::new(store.clone());
    let id = accounts.register("a@x.com", "secret1", "Ana", "Lee").await.unwrap();

    let profile = UserService::new(store.clone())
        .get_user_info(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.role, Role::User);
    assert_eq!(profile.full_name(), "Ana Lee");

    assert!(matches!(
        accounts.register("a@x.com", "other", "Ana", "Lee").await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        accounts.register("not-an-email", "secret1", "Ana", "Lee").await,
        Err(AppError::InvalidArgument(_))
    ));
}

/// A store that can still answer account lookups (when `account` is set)
/// but fails every other call.
struct BrokenStore {
    account: Option<Document>,
}

fn broken() -> PortError {
    PortError::Remote("store unavailable".to_string())
}

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn get(&self, _: &str, _: &str) -> PortResult<Option<Document>> {
        Err(broken())
    }
    async fn query(&self, _: &Query) -> PortResult<Vec<Document>> {
        self.account.clone().map(|doc| vec![doc]).ok_or_else(broken)
    }
    async fn add(&self, _: &str, _: Value) -> PortResult<String> {
        Err(broken())
    }
    async fn set(&self, _: &str, _: &str, _: Value, _: SetOptions) -> PortResult<()> {
        Err(broken())
    }
    async fn update(&self, _: &str, _: &str, _: Value) -> PortResult<()> {
        Err(broken())
    }
    async fn delete(&self, _: &str, _: &str) -> PortResult<()> {
        Err(broken())
    }
    fn watch(&self, _: &WatchTarget) -> PortResult<SnapshotStream> {
        Err(broken())
    }
}

fn seeded_client(store: BrokenStore) -> Client {
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let c = client(&store);
    c.storage.set(TOKEN_KEY, "cafe");
    c.storage.set(EMAIL_KEY, "a@x.com");
    c.storage.set(PROFILE_KEY, "{}");
    c
}

fn assert_local_cache_cleared(c: &Client) {
    assert_eq!(c.storage.get(TOKEN_KEY), None);
    assert_eq!(c.storage.get(EMAIL_KEY), None);
    assert_eq!(c.storage.get(PROFILE_KEY), None);
}

#[tokio::test]
async fn store_errors_during_validation_mean_logged_out() {
    let c = seeded_client(BrokenStore { account: None });

    assert!(!c.session.check_session().await);
    assert_local_cache_cleared(&c);
    assert!(matches!(
        c.session.require_session().await,
        Err(AppError::SessionInvalid)
    ));
}

#[tokio::test]
async fn logout_clears_local_cache_when_token_write_fails() {
    let account = Document::new(
        "acc1",
        json!({
            "email": "a@x.com",
            "password": "00",
            "salt": "00",
            "token": "cafe",
            "createdAt": "2024-06-01T00:00:00Z"
        }),
    );
    let c = seeded_client(BrokenStore {
        account: Some(account),
    });

    c.session.logout().await;
    assert_local_cache_cleared(&c);
}

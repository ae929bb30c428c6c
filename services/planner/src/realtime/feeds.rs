//! services/planner/src/realtime/feeds.rs
//!
//! Typed live feeds on top of [`RealtimeManager`]: each one picks the query,
//! decodes the pushed documents and hands domain records to the caller.
//! Documents that fail to decode are skipped with a warning.

use planner_core::{Account, ClassSession, Document, UserProfile};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppResult;
use crate::realtime::manager::{LiveEvent, RealtimeManager};
use crate::services::classes::{sort_classes, ClassService};
use crate::services::users::{sort_by_role_then_name, UserService};
use crate::services::AccountService;

pub const CLASSES_KEY: &str = "classes";
pub const USER_CLASSES_KEY: &str = "userClasses";
pub const USERS_KEY: &str = "users";
pub const ACCOUNTS_KEY: &str = "accounts";

pub fn user_info_key(user_id: &str) -> String {
    format!("userInfo-{}", user_id)
}

/// A decoded update of a typed feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    Update(T),
    Stalled(String),
}

fn decode_snapshot<T: DeserializeOwned>(key: &str, docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping undecodable document in '{}': {}", key, e);
                None
            }
        })
        .collect()
}

/// Wraps a typed handler into a raw [`LiveEvent`] handler.
fn typed<T, U, M, F>(key: &str, map: M, on_update: F) -> impl Fn(&LiveEvent) + Send + Sync + 'static
where
    T: DeserializeOwned,
    M: Fn(Vec<T>) -> U + Send + Sync + 'static,
    F: Fn(FeedEvent<U>) + Send + Sync + 'static,
{
    let key = key.to_string();
    move |event: &LiveEvent| match event {
        LiveEvent::Snapshot(docs) => on_update(FeedEvent::Update(map(decode_snapshot(&key, docs)))),
        LiveEvent::Stalled { reason } => on_update(FeedEvent::Stalled(reason.clone())),
    }
}

/// Classes of one month, by date then start time. `key` defaults to
/// [`CLASSES_KEY`].
pub fn subscribe_classes_by_month<F>(
    manager: &RealtimeManager,
    classes: &ClassService,
    year: i32,
    month: u32,
    key: Option<&str>,
    on_update: F,
) -> AppResult<()>
where
    F: Fn(FeedEvent<Vec<ClassSession>>) + Send + Sync + 'static,
{
    let key = key.unwrap_or(CLASSES_KEY);
    let target = classes.classes_by_month_target(year, month)?;
    let handler = typed(
        key,
        |mut list: Vec<ClassSession>| {
            sort_classes(&mut list);
            list
        },
        on_update,
    );
    manager.subscribe(key, &target, handler)?;
    Ok(())
}

/// Classes the user mentors, supports or manages. `key` defaults to
/// [`USER_CLASSES_KEY`].
pub fn subscribe_user_classes<F>(
    manager: &RealtimeManager,
    classes: &ClassService,
    user_id: &str,
    key: Option<&str>,
    on_update: F,
) -> AppResult<()>
where
    F: Fn(FeedEvent<Vec<ClassSession>>) + Send + Sync + 'static,
{
    let key = key.unwrap_or(USER_CLASSES_KEY);
    let user_id = user_id.to_string();
    let handler = typed(
        key,
        move |list: Vec<ClassSession>| {
            let mut mine: Vec<ClassSession> =
                list.into_iter().filter(|c| c.involves(&user_id)).collect();
            sort_classes(&mut mine);
            mine
        },
        on_update,
    );
    manager.subscribe(key, &classes.classes_target(), handler)?;
    Ok(())
}

/// Every user profile, highest role first.
pub fn subscribe_users<F>(manager: &RealtimeManager, users: &UserService, on_update: F) -> AppResult<()>
where
    F: Fn(FeedEvent<Vec<UserProfile>>) + Send + Sync + 'static,
{
    let handler = typed(
        USERS_KEY,
        |mut list: Vec<UserProfile>| {
            sort_by_role_then_name(&mut list);
            list
        },
        on_update,
    );
    manager.subscribe(USERS_KEY, &users.users_target(), handler)?;
    Ok(())
}

/// One profile; `None` while the document does not exist.
pub fn subscribe_user_info<F>(
    manager: &RealtimeManager,
    users: &UserService,
    user_id: &str,
    on_update: F,
) -> AppResult<()>
where
    F: Fn(FeedEvent<Option<UserProfile>>) + Send + Sync + 'static,
{
    let key = user_info_key(user_id);
    let handler = typed(
        &key,
        |list: Vec<UserProfile>| list.into_iter().next(),
        on_update,
    );
    manager.subscribe(&key, &users.user_info_target(user_id), handler)?;
    Ok(())
}

pub fn subscribe_accounts<F>(
    manager: &RealtimeManager,
    accounts: &AccountService,
    on_update: F,
) -> AppResult<()>
where
    F: Fn(FeedEvent<Vec<Account>>) + Send + Sync + 'static,
{
    let handler = typed(ACCOUNTS_KEY, |list: Vec<Account>| list, on_update);
    manager.subscribe(ACCOUNTS_KEY, &accounts.accounts_target(), handler)?;
    Ok(())
}

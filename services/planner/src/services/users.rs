//! services/planner/src/services/users.rs
//!
//! User profile reads and writes over the `users` collection.

use chrono::Utc;
use planner_core::domain::USERS;
use planner_core::{
    decode_all, to_fields, Direction, DocumentStore, Query, Role, SetOptions, UserProfile,
    WatchTarget,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Fields for a full profile write.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Defaults to [`Role::User`].
    pub role: Option<Role>,
}

/// A partial profile update; only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Roles that role management may hand out. `owner` is never assignable.
pub const ASSIGNABLE_ROLES: [Role; 3] = [Role::User, Role::Member, Role::Admin];

/// Parses a role name and checks it is one role management may assign.
pub fn parse_assignable_role(role: &str) -> AppResult<Role> {
    let parsed: Role = role
        .parse()
        .map_err(|e: planner_core::UnknownRole| AppError::InvalidArgument(e.to_string()))?;
    if !ASSIGNABLE_ROLES.contains(&parsed) {
        return Err(AppError::InvalidArgument(format!(
            "role '{}' cannot be assigned; allowed: user, member, admin",
            role
        )));
    }
    Ok(parsed)
}

/// Orders users by role rank (highest first), then by "first last" name,
/// case-insensitively.
pub fn sort_by_role_then_name(users: &mut [UserProfile]) {
    users.sort_by(|a, b| {
        b.role
            .rank()
            .cmp(&a.role.rank())
            .then_with(|| a.full_name().to_lowercase().cmp(&b.full_name().to_lowercase()))
    });
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Writes the whole profile under `user_id`, replacing anything there.
    pub async fn save_user_info(&self, user_id: &str, profile: NewProfile) -> AppResult<()> {
        let now = Utc::now();
        let record = UserProfile {
            id: user_id.to_string(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            role: profile.role.unwrap_or_default(),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .set(USERS, user_id, to_fields(&record)?, SetOptions::default())
            .await?;
        info!("Saved profile for user {}", user_id);
        Ok(())
    }

    pub async fn get_user_info(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let doc = self.store.get(USERS, user_id).await?;
        Ok(doc.map(|d| d.decode()).transpose()?)
    }

    /// Merges the provided fields into the profile and stamps `updatedAt`.
    /// `NotFound` when the user has no profile yet.
    pub async fn update_user_info(&self, user_id: &str, patch: ProfilePatch) -> AppResult<()> {
        let mut fields = to_fields(&patch)?;
        stamp_updated_at(&mut fields);
        self.store.update(USERS, user_id, fields).await?;
        info!("Updated profile for user {}", user_id);
        Ok(())
    }

    /// Changes a user's role. Only `user`, `member` and `admin` are accepted,
    /// and only for users that already have a profile.
    pub async fn update_user_role(&self, user_id: &str, role: &str) -> AppResult<()> {
        let role = parse_assignable_role(role)?;
        let mut fields = serde_json::json!({ "role": role });
        stamp_updated_at(&mut fields);
        self.store.update(USERS, user_id, fields).await?;
        info!("Role of user {} set to {}", user_id, role);
        Ok(())
    }

    /// All users, highest role first, then by name.
    pub async fn get_all_users(&self) -> AppResult<Vec<UserProfile>> {
        let docs = self.store.query(&Query::collection(USERS)).await?;
        let mut users: Vec<UserProfile> = decode_all(&docs)?;
        sort_by_role_then_name(&mut users);
        Ok(users)
    }

    /// Users who may be picked as mentors, ordered by last name.
    pub async fn get_mentors(&self) -> AppResult<Vec<UserProfile>> {
        let docs = self
            .store
            .query(&Query::collection(USERS).order_by("lastName", Direction::Asc))
            .await?;
        let users: Vec<UserProfile> = decode_all(&docs)?;
        Ok(users.into_iter().filter(|u| u.role.can_mentor()).collect())
    }

    pub fn users_target(&self) -> WatchTarget {
        WatchTarget::Query(Query::collection(USERS))
    }

    pub fn user_info_target(&self, user_id: &str) -> WatchTarget {
        WatchTarget::document(USERS, user_id)
    }
}

fn stamp_updated_at(fields: &mut Value) {
    if let Value::Object(map) = fields {
        map.insert("updatedAt".to_string(), serde_json::json!(Utc::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: &str, last: &str, role: Role) -> UserProfile {
        UserProfile {
            id: format!("{}-{}", first, last),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}@x.com", first),
            role,
            avatar_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_and_unknown_roles_are_not_assignable() {
        assert_eq!(parse_assignable_role("member").unwrap(), Role::Member);
        assert!(matches!(parse_assignable_role("owner"), Err(AppError::InvalidArgument(_))));
        assert!(matches!(parse_assignable_role("root"), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn users_sort_by_rank_then_name() {
        let mut users = vec![
            profile("zed", "a", Role::User),
            profile("Bob", "b", Role::Admin),
            profile("amy", "c", Role::User),
            profile("Kim", "d", Role::Owner),
        ];
        sort_by_role_then_name(&mut users);
        let names: Vec<&str> = users.iter().map(|u| u.first_name.as_str()).collect();
        assert_eq!(names, vec!["Kim", "Bob", "amy", "zed"]);
    }

    async fn service_with_ana() -> UserService {
        let store = crate::adapters::SqliteDocumentStore::in_memory().await.unwrap();
        let users = UserService::new(Arc::new(store));
        users
            .save_user_info(
                "u1",
                NewProfile {
                    first_name: "Ana".to_string(),
                    last_name: "Lee".to_string(),
                    email: "a@x.com".to_string(),
                    role: None,
                },
            )
            .await
            .unwrap();
        users
    }

    #[tokio::test]
    async fn updates_never_create_partial_profiles() {
        let users = service_with_ana().await;
        let patch = ProfilePatch {
            avatar_url: Some("https://cdn.example.com/ghost.jpg".to_string()),
            ..ProfilePatch::default()
        };

        assert!(matches!(
            users.update_user_info("ghost", patch).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            users.update_user_role("ghost", "member").await,
            Err(AppError::NotFound(_))
        ));

        assert!(users.get_user_info("ghost").await.unwrap().is_none());
        let all = users.get_all_users().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "u1");
    }

    #[tokio::test]
    async fn role_update_keeps_the_rest_of_the_profile() {
        let users = service_with_ana().await;
        users.update_user_role("u1", "member").await.unwrap();

        let profile = users.get_user_info("u1").await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Member);
        assert_eq!(profile.full_name(), "Ana Lee");
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let fields = to_fields(&ProfilePatch::default()).unwrap();
        assert_eq!(fields, serde_json::json!({}));
    }
}

//! services/planner/src/services/admin.rs
//!
//! Role management for administrators: listings, promotions and demotions.

use planner_core::domain::USERS;
use planner_core::{decode_all, Direction, DocumentStore, Query, Role, UserProfile};
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::services::users::UserService;

/// Head counts per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total: usize,
    pub admin: usize,
    pub member: usize,
    pub user: usize,
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn DocumentStore>,
    users: UserService,
}

impl AdminService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            store,
        }
    }

    /// All users, newest first.
    pub async fn get_all_users(&self) -> AppResult<Vec<UserProfile>> {
        let docs = self
            .store
            .query(&Query::collection(USERS).order_by("createdAt", Direction::Desc))
            .await?;
        Ok(decode_all(&docs)?)
    }

    /// Users holding `role`, ordered by last name.
    pub async fn get_users_by_role(&self, role: Role) -> AppResult<Vec<UserProfile>> {
        let docs = self
            .store
            .query(
                &Query::collection(USERS)
                    .where_eq("role", role.as_str())
                    .order_by("lastName", Direction::Asc),
            )
            .await?;
        Ok(decode_all(&docs)?)
    }

    pub async fn promote_to_member(&self, user_id: &str) -> AppResult<()> {
        self.users.update_user_role(user_id, Role::Member.as_str()).await?;
        info!("User {} promoted to member", user_id);
        Ok(())
    }

    pub async fn promote_to_admin(&self, user_id: &str) -> AppResult<()> {
        self.users.update_user_role(user_id, Role::Admin.as_str()).await?;
        info!("User {} promoted to admin", user_id);
        Ok(())
    }

    /// Lowers a user to `user` or `member`.
    pub async fn demote_user(&self, user_id: &str, new_role: &str) -> AppResult<()> {
        if new_role != Role::User.as_str() && new_role != Role::Member.as_str() {
            return Err(AppError::InvalidArgument(format!(
                "cannot demote to '{}'; expected user or member",
                new_role
            )));
        }
        self.users.update_user_role(user_id, new_role).await?;
        info!("User {} demoted to {}", user_id, new_role);
        Ok(())
    }

    pub async fn get_user_stats(&self) -> AppResult<UserStats> {
        let users = self.get_all_users().await?;
        let count = |role: Role| users.iter().filter(|u| u.role == role).count();
        Ok(UserStats {
            total: users.len(),
            admin: count(Role::Admin),
            member: count(Role::Member),
            user: count(Role::User),
        })
    }
}

//! services/planner/src/services/setup.rs
//!
//! First-run helpers: making sure an administrator exists and seeding
//! development data.

use planner_core::domain::USERS;
use planner_core::{decode_all, DocumentStore, Query, Role, UserProfile};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::services::users::{NewProfile, UserService};

/// Result of [`SetupService::ensure_admin_exists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// At least one admin was already present.
    AdminPresent,
    /// The given user was promoted to be the first admin.
    Promoted { user_id: String },
    /// There are no users at all to promote.
    NoUsers,
}

const DEMO_USERS: [(&str, &str, &str, &str, Role); 5] = [
    ("demo_user_1", "Minh", "Nguyen Van", "minh.nguyen@test.com", Role::User),
    ("demo_user_2", "Hoa", "Tran Thi", "hoa.tran@test.com", Role::Member),
    ("demo_user_3", "Tuan", "Le Van", "tuan.le@test.com", Role::User),
    ("demo_user_4", "Linh", "Pham Thi", "linh.pham@test.com", Role::Member),
    ("demo_user_5", "Dung", "Hoang Van", "dung.hoang@test.com", Role::Admin),
];

#[derive(Clone)]
pub struct SetupService {
    store: Arc<dyn DocumentStore>,
    users: UserService,
}

impl SetupService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            store,
        }
    }

    /// Promotes the first stored user to admin when no admin exists yet.
    pub async fn ensure_admin_exists(&self) -> AppResult<SetupOutcome> {
        let admins = self
            .store
            .query(&Query::collection(USERS).where_eq("role", Role::Admin.as_str()))
            .await?;
        if !admins.is_empty() {
            info!("An admin already exists");
            return Ok(SetupOutcome::AdminPresent);
        }

        let everyone = self.store.query(&Query::collection(USERS)).await?;
        let Some(first) = everyone.first() else {
            warn!("No users exist to promote to admin");
            return Ok(SetupOutcome::NoUsers);
        };
        let profile: UserProfile = first.decode()?;
        self.users
            .update_user_role(&profile.id, Role::Admin.as_str())
            .await?;
        info!(
            "Promoted {} ({}) to be the first admin",
            profile.full_name(),
            profile.email
        );
        Ok(SetupOutcome::Promoted { user_id: profile.id })
    }

    /// Promotes the given users to member, or the first two plain users when
    /// no ids are given. Returns how many were promoted.
    pub async fn create_sample_members(&self, user_ids: &[String]) -> AppResult<usize> {
        let targets: Vec<String> = if user_ids.is_empty() {
            let docs = self
                .store
                .query(&Query::collection(USERS).where_eq("role", Role::User.as_str()))
                .await?;
            let users: Vec<UserProfile> = decode_all(&docs)?;
            users.into_iter().take(2).map(|u| u.id).collect()
        } else {
            user_ids.to_vec()
        };

        for user_id in &targets {
            self.users
                .update_user_role(user_id, Role::Member.as_str())
                .await?;
        }
        info!("Promoted {} users to member", targets.len());
        Ok(targets.len())
    }

    /// Writes a fixed set of demo profiles for development.
    pub async fn create_demo_users(&self) -> AppResult<usize> {
        for (id, first_name, last_name, email, role) in DEMO_USERS {
            self.users
                .save_user_info(
                    id,
                    NewProfile {
                        first_name: first_name.to_string(),
                        last_name: last_name.to_string(),
                        email: email.to_string(),
                        role: Some(role),
                    },
                )
                .await?;
        }
        info!("Created {} demo users", DEMO_USERS.len());
        Ok(DEMO_USERS.len())
    }
}

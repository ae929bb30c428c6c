//! services/planner/src/services/accounts.rs
//!
//! Account registration and lookups over the `accounts` collection.

use chrono::Utc;
use planner_core::domain::ACCOUNTS;
use planner_core::{decode_all, to_fields, Account, DocumentStore, Query, WatchTarget};
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::services::password::{generate_salt, hash_password};
use crate::services::users::{NewProfile, UserService};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    users: UserService,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            store,
        }
    }

    /// Creates an account with an empty session token plus its profile, both
    /// under the same id. New users always start with the `user` role.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<String> {
        if !email_pattern().is_match(email) {
            return Err(AppError::InvalidArgument(format!("'{}' is not a valid email", email)));
        }
        if password.is_empty() {
            return Err(AppError::InvalidArgument("password must not be empty".to_string()));
        }
        if self.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict(format!("an account for {} already exists", email)));
        }

        let salt = generate_salt();
        let account = Account {
            id: String::new(),
            email: email.to_string(),
            password: hash_password(password, &salt)?,
            salt,
            token: String::new(),
            created_at: Utc::now(),
            last_login: None,
        };
        let id = self.store.add(ACCOUNTS, to_fields(&account)?).await?;

        self.users
            .save_user_info(
                &id,
                NewProfile {
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    email: email.to_string(),
                    role: None,
                },
            )
            .await?;

        info!("Registered account {} for {}", id, email);
        Ok(id)
    }

    /// The first account registered with this email, if any.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let docs = self
            .store
            .query(&Query::collection(ACCOUNTS).where_eq("email", email))
            .await?;
        Ok(docs.first().map(|doc| doc.decode()).transpose()?)
    }

    pub async fn get_all_accounts(&self) -> AppResult<Vec<Account>> {
        let docs = self.store.query(&Query::collection(ACCOUNTS)).await?;
        Ok(decode_all(&docs)?)
    }

    /// Replaces the account's session token and stamps the login time.
    /// An empty token ends the session.
    pub async fn set_token(&self, account_id: &str, token: &str) -> AppResult<()> {
        self.store
            .update(
                ACCOUNTS,
                account_id,
                json!({ "token": token, "lastLogin": Utc::now() }),
            )
            .await?;
        Ok(())
    }

    pub fn accounts_target(&self) -> WatchTarget {
        WatchTarget::Query(Query::collection(ACCOUNTS))
    }
}

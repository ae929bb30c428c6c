//! services/planner/src/services/session.rs
//!
//! The single-active-session protocol.
//!
//! Each account stores exactly one current token. Logging in writes a fresh
//! token, which silently invalidates any other client still holding the old
//! one: that client fails its next [`SessionService::validate_session`].
//! There is no expiry and no refresh; the last login wins.
//!
//! Every failure while validating counts as "not logged in".

use planner_core::{ClientStorage, UserProfile};
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::services::accounts::AccountService;
use crate::services::password::verify_password;
use crate::services::users::UserService;

/// Client storage key of the cached session token.
pub const TOKEN_KEY: &str = "authToken";
/// Client storage key of the cached account email.
pub const EMAIL_KEY: &str = "userEmail";
/// Client storage key of the last known profile, for painting before the
/// network answers.
pub const PROFILE_KEY: &str = "cachedProfile";

const TOKEN_BYTES: usize = 32;

/// A new opaque session token: 256 random bits, hex encoded.
pub fn issue_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// What a successful login hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub account_id: String,
    pub email: String,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionService {
    accounts: AccountService,
    users: UserService,
    storage: Arc<dyn ClientStorage>,
}

impl SessionService {
    pub fn new(accounts: AccountService, users: UserService, storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            accounts,
            users,
            storage,
        }
    }

    /// Verifies the credentials and makes this client the only valid session
    /// of the account.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no account for {}", email)))?;

        if !verify_password(password, &account.password, &account.salt) {
            warn!("Rejected login for {}: wrong password", email);
            return Err(AppError::InvalidCredentials);
        }

        let token = issue_token();
        // Overwriting the stored token is what logs out every other client.
        self.accounts.set_token(&account.id, &token).await?;

        self.storage.set(TOKEN_KEY, &token);
        self.storage.set(EMAIL_KEY, email);
        info!("Account {} logged in", account.id);

        Ok(LoginOutcome {
            account_id: account.id,
            email: account.email,
            token,
        })
    }

    /// True only when `cached_token` exactly equals the account's stored
    /// token. Missing inputs, unknown accounts, mismatches and store errors
    /// all return false and clear the local cache.
    pub async fn validate_session(&self, cached_token: Option<&str>, email: Option<&str>) -> bool {
        let (Some(token), Some(email)) = (
            cached_token.filter(|t| !t.is_empty()),
            email.filter(|e| !e.is_empty()),
        ) else {
            self.clear_local();
            return false;
        };

        match self.accounts.find_by_email(email).await {
            Ok(Some(account)) if account.token == token => true,
            Ok(Some(account)) => {
                info!("Session of account {} was replaced by a newer login", account.id);
                self.clear_local();
                false
            }
            Ok(None) => {
                warn!("Cached session refers to unknown account {}", email);
                self.clear_local();
                false
            }
            Err(e) => {
                error!("Failed to validate session: {:?}", e);
                self.clear_local();
                false
            }
        }
    }

    /// Validates whatever token and email this client has cached.
    pub async fn check_session(&self) -> bool {
        let token = self.storage.get(TOKEN_KEY);
        let email = self.storage.get(EMAIL_KEY);
        self.validate_session(token.as_deref(), email.as_deref()).await
    }

    /// Route gate: the cached email when the session is valid,
    /// `SessionInvalid` otherwise.
    pub async fn require_session(&self) -> AppResult<String> {
        if !self.check_session().await {
            return Err(AppError::SessionInvalid);
        }
        self.storage.get(EMAIL_KEY).ok_or(AppError::SessionInvalid)
    }

    /// Ends the session. Clearing the stored token is best effort; the local
    /// cache is cleared regardless.
    pub async fn logout(&self) {
        if let Some(email) = self.storage.get(EMAIL_KEY) {
            if let Err(e) = self.end_stored_session(&email).await {
                warn!("Failed to clear stored token for {}: {:?}", email, e);
            }
        }
        self.clear_local();
        info!("Logged out");
    }

    async fn end_stored_session(&self, email: &str) -> AppResult<()> {
        if let Some(account) = self.accounts.find_by_email(email).await? {
            self.accounts.set_token(&account.id, "").await?;
        }
        Ok(())
    }

    /// Fetches the profile and remembers it for the next fast paint.
    pub async fn refresh_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let profile = self.users.get_user_info(user_id).await?;
        if let Some(profile) = &profile {
            match serde_json::to_string(profile) {
                Ok(raw) => self.storage.set(PROFILE_KEY, &raw),
                Err(e) => warn!("Could not cache profile {}: {}", user_id, e),
            }
        }
        Ok(profile)
    }

    /// The last profile cached by [`SessionService::refresh_profile`].
    pub fn cached_profile(&self) -> Option<UserProfile> {
        let raw = self.storage.get(PROFILE_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    fn clear_local(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(EMAIL_KEY);
        self.storage.remove(PROFILE_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = issue_token();
        let b = issue_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}

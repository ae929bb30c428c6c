//! crates/planner_core/src/domain.rs
//!
//! Defines the core data structures of the class planner.
//! Field names follow the camelCase layout the documents use on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Collection holding login accounts.
pub const ACCOUNTS: &str = "accounts";
/// Collection holding user profiles, keyed by the account id.
pub const USERS: &str = "users";
/// Collection holding scheduled class sessions.
pub const CLASSES: &str = "classes";

//=========================================================================================
// Accounts and Profiles
//=========================================================================================

/// A login account. `token` holds the single valid session token, empty when
/// nobody is logged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub email: String,
    /// Hex encoded argon2 digest of the password.
    pub password: String,
    /// Hex encoded per-account salt.
    pub salt: String,
    #[serde(default)]
    pub token: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Authorization role attached to a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Ordering weight used when listing users, highest first.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Member => 2,
            Role::User => 1,
        }
    }

    /// Whether a user with this role can be picked as a class mentor.
    pub fn can_mentor(&self) -> bool {
        !matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Profile details of a user; shares its id with the owning [`Account`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

//=========================================================================================
// Class Sessions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

/// A scheduled class. Mentor, support mentors and manager are profile ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSession {
    #[serde(default)]
    pub id: String,
    pub topic: String,
    pub mentor: String,
    /// Ordered, without duplicates and never containing `mentor`.
    #[serde(default)]
    pub support_mentors: Vec<String>,
    pub manager: String,
    pub date: NaiveDate,
    /// "HH:MM", zero padded so that string order is time order.
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassSession {
    /// True when the user teaches, supports or manages this class.
    pub fn involves(&self, user_id: &str) -> bool {
        self.mentor == user_id
            || self.manager == user_id
            || self.support_mentors.iter().any(|id| id == user_id)
    }
}

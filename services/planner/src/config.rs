//! services/planner/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub log_level: Level,
    /// File holding the cached session token, email and profile.
    pub client_state_path: PathBuf,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: String,
    pub seed_demo_users: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Storage ---
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let client_state_path = lookup("CLIENT_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.planner_state.json"));

        // --- Image CDN ---
        let cloudinary_cloud_name = lookup("CLOUDINARY_CLOUD_NAME").filter(|v| !v.is_empty());
        let cloudinary_upload_preset =
            lookup("CLOUDINARY_UPLOAD_PRESET").unwrap_or_else(|| "unsigned_upload".to_string());

        let seed_demo_users = match lookup("SEED_DEMO_USERS") {
            None => false,
            Some(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SEED_DEMO_USERS".to_string(),
                    format!("'{}' is not true or false", raw),
                )
            })?,
        };

        Ok(Self {
            database_url,
            log_level,
            client_state_path,
            cloudinary_cloud_name,
            cloudinary_upload_preset,
            seed_demo_users,
        })
    }
}

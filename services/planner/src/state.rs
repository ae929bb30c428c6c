//! services/planner/src/state.rs
//!
//! Defines the application's shared state: the adapters behind the ports and
//! the services built on top of them.

use crate::config::Config;
use crate::realtime::RealtimeManager;
use crate::services::{
    AccountService, AdminService, AvatarService, ClassService, SessionService, SetupService,
    UserService,
};
use planner_core::{ClientStorage, DocumentStore, ImageCdn};
use std::sync::Arc;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub accounts: AccountService,
    pub users: UserService,
    pub classes: ClassService,
    pub admin: AdminService,
    pub setup: SetupService,
    pub session: SessionService,
    /// Present only when a CDN cloud name is configured.
    pub avatars: Option<AvatarService>,
    /// Live queries of this process. Dropping the last handle closes them all.
    pub realtime: Arc<RealtimeManager>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ClientStorage>,
        cdn: Option<Arc<dyn ImageCdn>>,
    ) -> Self {
        let accounts = AccountService::new(store.clone());
        let users = UserService::new(store.clone());
        let avatars = match (cdn, config.cloudinary_cloud_name.clone()) {
            (Some(cdn), Some(cloud_name)) => Some(AvatarService::new(cdn, users.clone(), cloud_name)),
            _ => None,
        };

        Self {
            session: SessionService::new(accounts.clone(), users.clone(), storage),
            classes: ClassService::new(store.clone()),
            admin: AdminService::new(store.clone()),
            setup: SetupService::new(store.clone()),
            realtime: Arc::new(RealtimeManager::new(store.clone())),
            accounts,
            users,
            avatars,
            config,
            store,
        }
    }
}

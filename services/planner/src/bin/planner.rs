//! services/planner/src/bin/planner.rs

use chrono::{Datelike, Utc};
use planner_core::{ClientStorage, DocumentStore, ImageCdn};
use planner_lib::{
    adapters::{CloudinaryCdn, FileClientStorage, SqliteDocumentStore},
    config::Config,
    error::AppError,
    realtime::{feeds, month_key, FeedEvent},
    services::SetupOutcome,
    state::AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting planner...");

    // --- 2. Open the Document Store & Run Migrations ---
    let store = SqliteDocumentStore::connect(&config.database_url).await?;
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    // --- 3. Initialize Adapters ---
    let storage: Arc<dyn ClientStorage> =
        Arc::new(FileClientStorage::open(config.client_state_path.clone()));
    let cdn: Option<Arc<dyn ImageCdn>> = match &config.cloudinary_cloud_name {
        Some(cloud_name) => Some(Arc::new(CloudinaryCdn::new(
            reqwest::Client::new(),
            cloud_name.clone(),
            config.cloudinary_upload_preset.clone(),
        ))),
        None => {
            warn!("CLOUDINARY_CLOUD_NAME is not set; avatar uploads are disabled");
            None
        }
    };

    let state = AppState::new(config.clone(), store, storage, cdn);

    // --- 4. First-run Setup ---
    if config.seed_demo_users {
        state.setup.create_demo_users().await?;
    }
    match state.setup.ensure_admin_exists().await? {
        SetupOutcome::Promoted { user_id } => info!("User {} is now the admin", user_id),
        SetupOutcome::NoUsers => warn!("No users yet; register one to get an admin"),
        SetupOutcome::AdminPresent => {}
    }
    let stats = state.admin.get_user_stats().await?;
    info!(
        "Users: {} total, {} admin, {} member, {} user",
        stats.total, stats.admin, stats.member, stats.user
    );

    if state.session.check_session().await {
        info!("Resuming the cached session");
    }

    // --- 5. Follow This Month's Classes ---
    let today = Utc::now().date_naive();
    let key = month_key(today.year(), today.month());
    feeds::subscribe_classes_by_month(
        &state.realtime,
        &state.classes,
        today.year(),
        today.month(),
        Some(key.as_str()),
        |event| match event {
            FeedEvent::Update(classes) => {
                info!("{} classes scheduled this month", classes.len());
                for class in &classes {
                    info!("  {} {}-{} {}", class.date, class.start_time, class.end_time, class.topic);
                }
            }
            FeedEvent::Stalled(reason) => warn!("Class feed stopped: {}", reason),
        },
    )?;
    info!("Watching '{}'. Press Ctrl-C to stop.", key);

    // --- 6. Run Until Interrupted ---
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    state.realtime.unsubscribe_all();

    Ok(())
}

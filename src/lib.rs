//! Review Roster - pull request reviewer assignment service.
//!
//! Tracks teams, users and pull requests, assigns reviewers from the
//! author's team, and reassigns reviews when members become unavailable.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use config::{AppConfig, StorageBackend};
use error::AppError;
use services::http_api::ApiState;
use services::{ActivityHandle, ActivitySync, PullRequestManager, ReviewerDirectory};
use store::{InMemoryStore, ReviewStore, SqliteStore};

/// Wired application components sharing one store.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ReviewStore>,
    pub directory: Arc<ReviewerDirectory>,
    pub activity: ActivityHandle,
    pub manager: Arc<PullRequestManager>,
}

impl AppContext {
    /// Build the directory, activity worker and manager on top of `store`.
    ///
    /// Must be called inside a tokio runtime; the activity worker is spawned here.
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        let directory = Arc::new(ReviewerDirectory::with_store(store.clone()));
        let activity = ActivitySync::start_background(directory.clone());
        let manager = Arc::new(PullRequestManager::new(
            directory.clone(),
            store.clone(),
            activity.clone(),
        ));
        Self {
            store,
            directory,
            activity,
            manager,
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            manager: self.manager.clone(),
        }
    }
}

/// Open the store selected by the configuration.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn ReviewStore>, AppError> {
    match config.storage {
        StorageBackend::Sqlite => {
            log::info!("Opening database at {}", config.database.path.display());
            let pool = db::initialize(&config.database).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage, data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Run the HTTP service until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config
        .socket_addr()
        .map_err(|e| AppError::internal(e.to_string()))?;
    let store = open_store(&config).await?;
    let context = AppContext::new(store);

    let app = services::http_server::build_router(context.api_state(), config.request_timeout());
    let server = services::http_server::start_server(addr, app).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutdown requested");

    server.stop().await;
    if let Err(e) = context.activity.flush().await {
        log::warn!("[activity] Final flush failed: {}", e);
    }
    if let Err(e) = context.activity.stop().await {
        log::warn!("[activity] Stop failed: {}", e);
    }

    Ok(())
}

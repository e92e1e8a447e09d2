//! Background worker applying reviewer activity flag changes.
//!
//! Request handlers submit "mark these users (in)active" updates without
//! waiting for them. The worker applies each update to the directory cache
//! and, best-effort, to the store. Failures are logged and dropped; they
//! never affect reviewer sets. Commands are processed in submission order,
//! so `flush` returns once every earlier update has been applied.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;
use crate::services::directory::ReviewerDirectory;

/// A batch of users whose active flag should change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityUpdate {
    pub user_ids: Vec<String>,
    pub is_active: bool,
}

/// Commands that can be sent to the activity worker.
#[derive(Debug)]
pub enum ActivityCommand {
    /// Apply an activity update.
    Apply(ActivityUpdate),

    /// Reply once all earlier commands are processed.
    Flush(oneshot::Sender<()>),

    /// Stop the worker.
    Stop,
}

/// Lightweight handle for the background activity worker.
#[derive(Clone)]
pub struct ActivityHandle {
    command_tx: mpsc::Sender<ActivityCommand>,
}

impl ActivityHandle {
    /// Queue an update without waiting for it to be applied.
    pub async fn submit(&self, user_ids: Vec<String>, is_active: bool) -> Result<(), AppError> {
        if user_ids.is_empty() {
            return Ok(());
        }
        self.command_tx
            .send(ActivityCommand::Apply(ActivityUpdate {
                user_ids,
                is_active,
            }))
            .await
            .map_err(|_| AppError::internal("Activity worker not running"))
    }

    /// Wait until every update submitted before this call has been applied.
    pub async fn flush(&self) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(ActivityCommand::Flush(tx))
            .await
            .map_err(|_| AppError::internal("Activity worker not running"))?;
        rx.await
            .map_err(|_| AppError::internal("Activity worker stopped before flush completed"))
    }

    /// Ask the worker to stop after the commands already queued.
    pub async fn stop(&self) -> Result<(), AppError> {
        self.command_tx
            .send(ActivityCommand::Stop)
            .await
            .map_err(|_| AppError::internal("Activity worker not running"))
    }
}

/// Background activity worker.
pub struct ActivitySync {
    directory: Arc<ReviewerDirectory>,
}

impl ActivitySync {
    pub fn new(directory: Arc<ReviewerDirectory>) -> Self {
        Self { directory }
    }

    /// Spawn the worker loop and return a handle for sending commands.
    pub fn start_background(directory: Arc<ReviewerDirectory>) -> ActivityHandle {
        let (tx, mut rx) = mpsc::channel::<ActivityCommand>(256);

        tokio::spawn(async move {
            let worker = ActivitySync::new(directory);
            log::info!("[activity] Activity worker started");

            while let Some(cmd) = rx.recv().await {
                match cmd {
                    ActivityCommand::Apply(update) => worker.apply(&update).await,
                    // Everything queued before the flush has been applied
                    ActivityCommand::Flush(reply) => {
                        let _ = reply.send(());
                    }
                    ActivityCommand::Stop => {
                        log::info!("[activity] Activity worker stopping");
                        break;
                    }
                }
            }
            log::info!("[activity] Activity worker stopped");
        });

        ActivityHandle { command_tx: tx }
    }

    /// Apply one update to the cache, then to the store if there is one.
    pub async fn apply(&self, update: &ActivityUpdate) {
        log::debug!(
            "[activity] Setting is_active={} for {:?}",
            update.is_active,
            update.user_ids
        );
        self.directory
            .set_active(&update.user_ids, update.is_active)
            .await;

        // Best effort; the cache is already updated
        if let Some(store) = self.directory.store() {
            if let Err(e) = store
                .set_users_active(&update.user_ids, update.is_active)
                .await
            {
                log::warn!(
                    "[activity] Failed to persist is_active={} for {:?}: {}",
                    update.is_active,
                    update.user_ids,
                    e
                );
            }
        }
    }
}

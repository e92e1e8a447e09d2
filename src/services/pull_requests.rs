//! Pull request lifecycle.
//!
//! Owns the OPEN → MERGED state machine and ties reviewer selection,
//! persistence and activity updates together.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{
    AssignmentStats, BulkDeactivateResult, PullRequest, PullRequestShort, ReassignResult,
};
use crate::services::activity_sync::ActivityHandle;
use crate::services::assignment::AssignmentEngine;
use crate::services::directory::ReviewerDirectory;
use crate::store::ReviewStore;

pub struct PullRequestManager {
    directory: Arc<ReviewerDirectory>,
    store: Arc<dyn ReviewStore>,
    engine: AssignmentEngine,
}

fn require(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid_payload_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(value.to_string())
}

impl PullRequestManager {
    pub fn new(
        directory: Arc<ReviewerDirectory>,
        store: Arc<dyn ReviewStore>,
        activity: ActivityHandle,
    ) -> Self {
        let engine = AssignmentEngine::new(directory.clone(), store.clone(), activity);
        Self {
            directory,
            store,
            engine,
        }
    }

    pub fn directory(&self) -> &Arc<ReviewerDirectory> {
        &self.directory
    }

    pub fn engine(&self) -> &AssignmentEngine {
        &self.engine
    }

    /// Open a pull request and assign up to two reviewers from the author's team.
    ///
    /// Zero or one reviewer is fine when the team is small.
    pub async fn create(
        &self,
        author_id: &str,
        pull_request_name: &str,
        pull_request_id: &str,
    ) -> Result<PullRequest, AppError> {
        let author_id = require(author_id, "author_id")?;
        let pull_request_name = require(pull_request_name, "pull_request_name")?;
        let pull_request_id = require(pull_request_id, "pull_request_id")?;

        let team_name = self.directory.get_user_team(&author_id).await?;
        let reviewers = self.engine.assign_reviewers(&team_name, &author_id).await;

        let pr = PullRequest::new_open(
            pull_request_id,
            pull_request_name,
            author_id,
            reviewers.clone(),
        );
        // Duplicate ids are rejected here, before any reviewer goes busy
        self.store.create_pull_request(&pr).await?;

        log::info!(
            "Created pull request {} with reviewers {:?}",
            pr.pull_request_id,
            pr.assigned_reviewers
        );
        self.engine.submit_activity(reviewers, false).await;

        Ok(pr)
    }

    /// Mark a pull request merged. Merging twice returns the stored record
    /// unchanged.
    pub async fn merge(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        let mut pr = self.store.get_pull_request(pull_request_id).await?;

        // Already merged: no write, no second reactivation
        if !pr.mark_merged(Utc::now()) {
            return Ok(pr);
        }

        self.store.save_pull_request(&pr).await?;
        log::info!("Merged pull request {}", pr.pull_request_id);

        self.engine
            .submit_activity(pr.assigned_reviewers.clone(), true)
            .await;

        Ok(pr)
    }

    pub async fn reassign(
        &self,
        pull_request_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignResult, AppError> {
        let pull_request_id = require(pull_request_id, "pull_request_id")?;
        let old_reviewer_id = require(old_reviewer_id, "old_user_id")?;
        self.engine.reassign(&pull_request_id, &old_reviewer_id).await
    }

    pub async fn bulk_deactivate(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<BulkDeactivateResult, AppError> {
        self.engine.plan_and_apply_bulk_swap(team_name, user_ids).await
    }

    /// Pull requests (any status) where `user_id` is a reviewer.
    pub async fn list_for_reviewer(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        let prs = self.store.find_pull_requests_by_reviewer(user_id).await?;
        Ok(prs.iter().map(PullRequest::to_short).collect())
    }

    pub async fn assignment_stats(&self) -> Result<AssignmentStats, AppError> {
        self.store.assignment_stats().await
    }
}

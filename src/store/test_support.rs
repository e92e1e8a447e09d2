//! Store wrapper with switchable write failures, for exercising rollback paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{InMemoryStore, ReviewStore};
use crate::error::AppError;
use crate::models::{AssignmentStats, PullRequest, ReviewerSwap, Team, User};

#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::store_with_op("injected failure", operation));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for FlakyStore {
    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        self.check("save_user")?;
        self.inner.save_user(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        self.inner.get_user(user_id).await
    }

    async fn get_users_in_team(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        self.inner.get_users_in_team(team_name).await
    }

    async fn save_team(&self, team_name: &str) -> Result<(), AppError> {
        self.check("save_team")?;
        self.inner.save_team(team_name).await
    }

    async fn create_team_with_members(
        &self,
        team_name: &str,
        members: &[User],
    ) -> Result<(), AppError> {
        self.check("create_team_with_members")?;
        self.inner.create_team_with_members(team_name, members).await
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        self.inner.get_team(team_name).await
    }

    async fn set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<(), AppError> {
        self.check("set_users_active")?;
        self.inner.set_users_active(user_ids, is_active).await
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        self.check("create_pull_request")?;
        self.inner.create_pull_request(pr).await
    }

    async fn save_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        self.check("save_pull_request")?;
        self.inner.save_pull_request(pr).await
    }

    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        self.inner.get_pull_request(pull_request_id).await
    }

    async fn find_pull_requests_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        self.inner.find_pull_requests_by_reviewer(reviewer_id).await
    }

    async fn find_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<PullRequest>, AppError> {
        self.inner
            .find_open_pull_requests_by_reviewers(reviewer_ids)
            .await
    }

    async fn apply_bulk_reviewer_swaps_and_deactivate(
        &self,
        swaps: &[ReviewerSwap],
        users_to_deactivate: &[String],
    ) -> Result<(), AppError> {
        self.check("apply_bulk_reviewer_swaps_and_deactivate")?;
        self.inner
            .apply_bulk_reviewer_swaps_and_deactivate(swaps, users_to_deactivate)
            .await
    }

    async fn assignment_stats(&self) -> Result<AssignmentStats, AppError> {
        self.inner.assignment_stats().await
    }
}

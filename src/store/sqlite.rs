//! SQLite implementation of `ReviewStore`.

use async_trait::async_trait;

use super::ReviewStore;
use crate::db::pool::DbPool;
use crate::db::{pull_requests, teams, users};
use crate::error::AppError;
use crate::models::{AssignmentStats, PullRequest, ReviewerSwap, Team, User};

/// Store backed by a migrated SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ReviewStore for SqliteStore {
    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        users::save_user(&self.pool, user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        users::get_user(&self.pool, user_id).await
    }

    async fn get_users_in_team(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        users::get_users_in_team(&self.pool, team_name).await
    }

    async fn save_team(&self, team_name: &str) -> Result<(), AppError> {
        teams::save_team(&self.pool, team_name).await
    }

    async fn create_team_with_members(
        &self,
        team_name: &str,
        members: &[User],
    ) -> Result<(), AppError> {
        teams::create_team_with_members(&self.pool, team_name, members).await
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        teams::get_team(&self.pool, team_name).await
    }

    async fn set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<(), AppError> {
        users::set_users_active(&self.pool, user_ids, is_active).await
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        pull_requests::create_pull_request(&self.pool, pr).await
    }

    async fn save_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        pull_requests::save_pull_request(&self.pool, pr).await
    }

    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        pull_requests::get_pull_request(&self.pool, pull_request_id).await
    }

    async fn find_pull_requests_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        pull_requests::find_pull_requests_by_reviewer(&self.pool, reviewer_id).await
    }

    async fn find_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<PullRequest>, AppError> {
        pull_requests::find_open_pull_requests_by_reviewers(&self.pool, reviewer_ids).await
    }

    async fn apply_bulk_reviewer_swaps_and_deactivate(
        &self,
        swaps: &[ReviewerSwap],
        users_to_deactivate: &[String],
    ) -> Result<(), AppError> {
        pull_requests::apply_bulk_reviewer_swaps_and_deactivate(
            &self.pool,
            swaps,
            users_to_deactivate,
        )
        .await
    }

    async fn assignment_stats(&self) -> Result<AssignmentStats, AppError> {
        pull_requests::assignment_stats(&self.pool).await
    }
}

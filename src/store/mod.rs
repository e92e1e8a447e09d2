//! Storage abstraction for teams, users and pull requests.
//!
//! The `ReviewStore` trait is what the directory, the assignment engine and
//! the lifecycle manager talk to. Two backends exist: `SqliteStore` for
//! durable storage and `InMemoryStore` for tests and throwaway deployments.
//! Every method that writes more than one row is all-or-nothing.

mod memory;
mod sqlite;

#[cfg(test)]
pub(crate) mod test_support;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{AssignmentStats, PullRequest, ReviewerSwap, Team, User};

/// Persistent store for the reviewer assignment domain.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert or update a single user.
    async fn save_user(&self, user: &User) -> Result<(), AppError>;

    /// Get a user by id (`NotFound` if absent).
    async fn get_user(&self, user_id: &str) -> Result<User, AppError>;

    /// All users of a team, ordered by username.
    async fn get_users_in_team(&self, team_name: &str) -> Result<Vec<User>, AppError>;

    /// Create an empty team (`AlreadyExists` on collision).
    async fn save_team(&self, team_name: &str) -> Result<(), AppError>;

    /// Create a team and upsert its members atomically.
    async fn create_team_with_members(
        &self,
        team_name: &str,
        members: &[User],
    ) -> Result<(), AppError>;

    /// Get a team with its members (`NotFound` if absent).
    async fn get_team(&self, team_name: &str) -> Result<Team, AppError>;

    /// Set the active flag for several users atomically. Unknown ids are skipped.
    async fn set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<(), AppError>;

    /// Insert a new pull request (`AlreadyExists` if the id is taken).
    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), AppError>;

    /// Upsert a pull request and replace its whole reviewer set.
    async fn save_pull_request(&self, pr: &PullRequest) -> Result<(), AppError>;

    /// Get a pull request with reviewers (`NotFound` if absent).
    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError>;

    /// Pull requests of any status where the user is a reviewer.
    async fn find_pull_requests_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequest>, AppError>;

    /// Open pull requests with at least one reviewer in `reviewer_ids`.
    async fn find_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<PullRequest>, AppError>;

    /// Apply reviewer swaps and deactivate users in one transaction.
    async fn apply_bulk_reviewer_swaps_and_deactivate(
        &self,
        swaps: &[ReviewerSwap],
        users_to_deactivate: &[String],
    ) -> Result<(), AppError>;

    /// Reviewer assignment counters.
    async fn assignment_stats(&self) -> Result<AssignmentStats, AppError>;
}

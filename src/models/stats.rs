//! Assignment statistics models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Number of reviewer slots a user currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserAssignmentStat {
    pub user_id: String,
    pub username: String,
    pub assignments: i64,
}

/// Number of reviewers attached to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PullRequestAssignmentStat {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub reviewer_count: i64,
}

/// Aggregated reviewer assignment counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub by_user: Vec<UserAssignmentStat>,
    pub by_pull_request: Vec<PullRequestAssignmentStat>,
}

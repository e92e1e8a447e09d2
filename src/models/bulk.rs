//! Bulk deactivation models.

use serde::{Deserialize, Serialize};

/// One reviewer replacement applied transactionally by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSwap {
    pub pull_request_id: String,
    pub old_user_id: String,
    pub new_user_id: String,
}

/// One replacement as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerReplacement {
    pub old_user_id: String,
    pub new_user_id: String,
}

/// All replacements made on a single pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPrReassignment {
    pub pull_request_id: String,
    pub replacements: Vec<ReviewerReplacement>,
}

/// Result of deactivating a batch of team members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeactivateResult {
    pub team_name: String,
    /// Normalized target ids.
    pub deactivated: Vec<String>,
    pub reassignments: Vec<TeamPrReassignment>,
}

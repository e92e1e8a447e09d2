//! Pull request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// State of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl From<&str> for PullRequestStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => Self::Merged,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// A pull request with its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,

    pub pull_request_name: String,

    pub author_id: String,

    pub status: PullRequestStatus,

    /// Reviewer user ids (0..=2, no duplicates).
    pub assigned_reviewers: Vec<String>,

    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Hard domain limit on reviewers per pull request.
    pub const MAX_REVIEWERS: usize = 2;

    /// Build a new open pull request stamped with the current time.
    pub fn new_open(
        pull_request_id: impl Into<String>,
        pull_request_name: impl Into<String>,
        author_id: impl Into<String>,
        assigned_reviewers: Vec<String>,
    ) -> Self {
        Self {
            pull_request_id: pull_request_id.into(),
            pull_request_name: pull_request_name.into(),
            author_id: author_id.into(),
            status: PullRequestStatus::Open,
            assigned_reviewers,
            created_at: Some(Utc::now()),
            merged_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }

    /// Transition to `Merged`. Returns false if already merged.
    pub fn mark_merged(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_merged() {
            return false;
        }
        self.status = PullRequestStatus::Merged;
        self.merged_at = Some(at);
        true
    }

    /// Replace `old` with `new` in place, keeping the set size.
    /// Returns false if `old` is not a reviewer.
    pub fn replace_reviewer(&mut self, old: &str, new: &str) -> bool {
        match self.assigned_reviewers.iter().position(|r| r == old) {
            Some(idx) => {
                self.assigned_reviewers[idx] = new.to_string();
                true
            }
            None => false,
        }
    }

    /// Reviewer ids with empties and duplicates dropped, order preserved.
    /// Fails if more than [`Self::MAX_REVIEWERS`] remain.
    pub fn normalized_reviewers(&self) -> Result<Vec<String>, AppError> {
        let mut reviewers: Vec<String> = Vec::with_capacity(self.assigned_reviewers.len());
        for id in &self.assigned_reviewers {
            if id.is_empty() || reviewers.contains(id) {
                continue;
            }
            reviewers.push(id.clone());
        }
        if reviewers.len() > Self::MAX_REVIEWERS {
            return Err(AppError::invalid_payload_field(
                format!(
                    "pull request {} has {} reviewers, at most {} allowed",
                    self.pull_request_id,
                    reviewers.len(),
                    Self::MAX_REVIEWERS
                ),
                "assigned_reviewers",
            ));
        }
        Ok(reviewers)
    }

    pub fn to_short(&self) -> PullRequestShort {
        PullRequestShort {
            pull_request_id: self.pull_request_id.clone(),
            pull_request_name: self.pull_request_name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// Compact pull request view used in reviewer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// Outcome of a single reviewer reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignResult {
    pub pr: PullRequest,
    pub replaced_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_with(reviewers: &[&str]) -> PullRequest {
        PullRequest::new_open(
            "pr-1",
            "Add feature",
            "author",
            reviewers.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(PullRequestStatus::from("OPEN"), PullRequestStatus::Open);
        assert_eq!(PullRequestStatus::from("merged"), PullRequestStatus::Merged);
        assert_eq!(PullRequestStatus::from("unknown"), PullRequestStatus::Open);
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(PullRequestStatus::Merged.to_string(), "MERGED");
        assert_eq!(
            serde_json::to_string(&PullRequestStatus::Open).unwrap(),
            "\"OPEN\""
        );
    }

    #[test]
    fn test_mark_merged_is_one_way() {
        let mut pr = pr_with(&["b"]);
        let at = Utc::now();
        assert!(pr.mark_merged(at));
        assert!(pr.is_merged());
        assert_eq!(pr.merged_at, Some(at));

        assert!(!pr.mark_merged(Utc::now()));
        assert_eq!(pr.merged_at, Some(at));
    }

    #[test]
    fn test_replace_reviewer_keeps_position() {
        let mut pr = pr_with(&["b", "c"]);
        assert!(pr.replace_reviewer("b", "d"));
        assert_eq!(pr.assigned_reviewers, vec!["d", "c"]);
        assert!(!pr.replace_reviewer("x", "y"));
        assert_eq!(pr.assigned_reviewers.len(), 2);
    }

    #[test]
    fn test_normalized_reviewers_drops_duplicates() {
        let pr = pr_with(&["b", "", "b", "c"]);
        assert_eq!(pr.normalized_reviewers().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_normalized_reviewers_rejects_three() {
        let pr = pr_with(&["a", "b", "c"]);
        assert!(matches!(
            pr.normalized_reviewers(),
            Err(AppError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(pr_with(&[])).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("mergedAt").is_some());
        assert_eq!(json["status"], "OPEN");
    }
}

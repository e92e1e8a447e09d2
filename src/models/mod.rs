//! Data models for the application.
//!
//! These models represent the core entities stored by the persistent store,
//! cached by the reviewer directory, and exchanged over the HTTP API.

pub mod bulk;
pub mod pull_request;
pub mod stats;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use bulk::{BulkDeactivateResult, ReviewerReplacement, ReviewerSwap, TeamPrReassignment};
pub use pull_request::{PullRequest, PullRequestShort, PullRequestStatus, ReassignResult};
pub use stats::{AssignmentStats, PullRequestAssignmentStat, UserAssignmentStat};
pub use team::{Team, TeamMember};
pub use user::User;

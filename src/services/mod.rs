//! Business logic services.
//!
//! The reviewer directory and assignment engine hold the core logic; the
//! lifecycle manager ties them to the store, and the HTTP modules expose
//! it over JSON.

pub mod activity_sync;
pub mod assignment;
pub mod directory;
pub mod http_api;
pub mod http_server;
pub mod pull_requests;

pub use activity_sync::{ActivityHandle, ActivitySync};
pub use assignment::AssignmentEngine;
pub use directory::ReviewerDirectory;
pub use pull_requests::PullRequestManager;

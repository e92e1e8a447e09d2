//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A person who can author pull requests and review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,

    pub username: String,

    /// Team membership (at most one).
    pub team_name: Option<String>,

    /// Whether the user is available to be assigned as a new reviewer.
    pub is_active: bool,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        team_name: Option<String>,
        is_active: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            team_name,
            is_active,
        }
    }

    /// Check if the user belongs to the given team.
    pub fn is_in_team(&self, team_name: &str) -> bool {
        self.team_name.as_deref() == Some(team_name)
    }
}

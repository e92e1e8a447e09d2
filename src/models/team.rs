//! Team model.

use super::user::User;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member as exposed in team payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl TeamMember {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active,
        }
    }

    /// Convert into a user belonging to `team_name`.
    pub fn to_user(&self, team_name: &str) -> User {
        User {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            team_name: Some(team_name.to_string()),
            is_active: self.is_active,
        }
    }
}

impl From<&User> for TeamMember {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            is_active: user.is_active,
        }
    }
}

/// A named group of users. Reviewers are always drawn from the author's team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Member users with their team set.
    pub fn users(&self) -> Vec<User> {
        self.members
            .iter()
            .map(|m| m.to_user(&self.team_name))
            .collect()
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

//! In-memory implementation of `ReviewStore`.
//!
//! All data lives behind a single `RwLock` and is lost on restart. Each
//! write takes the lock once and validates everything before mutating, so
//! failed operations leave no partial state behind.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ReviewStore;
use crate::error::AppError;
use crate::models::{
    AssignmentStats, PullRequest, PullRequestAssignmentStat, ReviewerSwap, Team, TeamMember, User,
    UserAssignmentStat,
};

#[derive(Default)]
struct Inner {
    teams: HashSet<String>,
    users: HashMap<String, User>,
    pull_requests: HashMap<String, PullRequest>,
}

impl Inner {
    fn users_in_team(&self, team_name: &str) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .values()
            .filter(|u| u.is_in_team(team_name))
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users
    }
}

/// Store holding everything in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn with_normalized_reviewers(pr: &PullRequest) -> Result<PullRequest, AppError> {
    let mut stored = pr.clone();
    stored.assigned_reviewers = pr.normalized_reviewers()?;
    Ok(stored)
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("User", user_id))
    }

    async fn get_users_in_team(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users_in_team(team_name))
    }

    async fn save_team(&self, team_name: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if !inner.teams.insert(team_name.to_string()) {
            return Err(AppError::already_exists("Team", team_name));
        }
        Ok(())
    }

    async fn create_team_with_members(
        &self,
        team_name: &str,
        members: &[User],
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.teams.contains(team_name) {
            return Err(AppError::already_exists("Team", team_name));
        }

        inner.teams.insert(team_name.to_string());
        for user in members {
            inner.users.insert(user.user_id.clone(), user.clone());
        }
        Ok(())
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        let inner = self.inner.read().await;
        if !inner.teams.contains(team_name) {
            return Err(AppError::not_found_with_id("Team", team_name));
        }

        Ok(Team {
            team_name: team_name.to_string(),
            members: inner
                .users_in_team(team_name)
                .iter()
                .map(TeamMember::from)
                .collect(),
        })
    }

    async fn set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        for user_id in user_ids {
            if let Some(user) = inner.users.get_mut(user_id) {
                user.is_active = is_active;
            }
        }
        Ok(())
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        let stored = with_normalized_reviewers(pr)?;
        let mut inner = self.inner.write().await;
        if inner.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(AppError::already_exists("PullRequest", &pr.pull_request_id));
        }
        inner
            .pull_requests
            .insert(stored.pull_request_id.clone(), stored);
        Ok(())
    }

    async fn save_pull_request(&self, pr: &PullRequest) -> Result<(), AppError> {
        let stored = with_normalized_reviewers(pr)?;
        let mut inner = self.inner.write().await;
        inner
            .pull_requests
            .insert(stored.pull_request_id.clone(), stored);
        Ok(())
    }

    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        let inner = self.inner.read().await;
        inner
            .pull_requests
            .get(pull_request_id)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pull_request_id))
    }

    async fn find_pull_requests_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        let inner = self.inner.read().await;
        let mut prs: Vec<PullRequest> = inner
            .pull_requests
            .values()
            .filter(|pr| pr.has_reviewer(reviewer_id))
            .cloned()
            .collect();
        prs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.pull_request_id.cmp(&b.pull_request_id))
        });
        Ok(prs)
    }

    async fn find_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<PullRequest>, AppError> {
        let inner = self.inner.read().await;
        let mut prs: Vec<PullRequest> = inner
            .pull_requests
            .values()
            .filter(|pr| pr.is_open() && reviewer_ids.iter().any(|id| pr.has_reviewer(id)))
            .cloned()
            .collect();
        prs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pull_request_id.cmp(&b.pull_request_id))
        });
        Ok(prs)
    }

    async fn apply_bulk_reviewer_swaps_and_deactivate(
        &self,
        swaps: &[ReviewerSwap],
        users_to_deactivate: &[String],
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;

        // Stage every swap on copies; nothing is written until all succeed.
        let mut staged: HashMap<String, PullRequest> = HashMap::new();
        for swap in swaps {
            if swap.pull_request_id.is_empty()
                || swap.old_user_id.is_empty()
                || swap.new_user_id.is_empty()
            {
                return Err(AppError::invalid_payload(format!(
                    "invalid reviewer swap: {:?}",
                    swap
                )));
            }

            if !staged.contains_key(&swap.pull_request_id) {
                let pr = inner
                    .pull_requests
                    .get(&swap.pull_request_id)
                    .cloned()
                    .ok_or_else(|| AppError::not_found_with_id("PullRequest", &swap.pull_request_id))?;
                staged.insert(swap.pull_request_id.clone(), pr);
            }
            let Some(pr) = staged.get_mut(&swap.pull_request_id) else {
                continue;
            };

            if pr.has_reviewer(&swap.new_user_id) {
                return Err(AppError::store_with_op(
                    format!(
                        "reviewer {} already assigned to {}",
                        swap.new_user_id, swap.pull_request_id
                    ),
                    "apply_bulk_reviewer_swaps",
                ));
            }
            if !pr.replace_reviewer(&swap.old_user_id, &swap.new_user_id) {
                return Err(AppError::store_with_op(
                    format!(
                        "reviewer {} is no longer assigned to {}",
                        swap.old_user_id, swap.pull_request_id
                    ),
                    "apply_bulk_reviewer_swaps",
                ));
            }
        }

        for (id, pr) in staged {
            inner.pull_requests.insert(id, pr);
        }
        for user_id in users_to_deactivate {
            if let Some(user) = inner.users.get_mut(user_id) {
                user.is_active = false;
            }
        }

        Ok(())
    }

    async fn assignment_stats(&self) -> Result<AssignmentStats, AppError> {
        let inner = self.inner.read().await;

        let mut counts: HashMap<&str, i64> = HashMap::new();
        for pr in inner.pull_requests.values() {
            for reviewer in &pr.assigned_reviewers {
                *counts.entry(reviewer.as_str()).or_default() += 1;
            }
        }

        let mut by_user: Vec<UserAssignmentStat> = counts
            .into_iter()
            .map(|(user_id, assignments)| UserAssignmentStat {
                user_id: user_id.to_string(),
                username: inner
                    .users
                    .get(user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                assignments,
            })
            .collect();
        by_user.sort_by(|a, b| {
            b.assignments
                .cmp(&a.assignments)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut by_pull_request: Vec<PullRequestAssignmentStat> = inner
            .pull_requests
            .values()
            .map(|pr| PullRequestAssignmentStat {
                pull_request_id: pr.pull_request_id.clone(),
                pull_request_name: pr.pull_request_name.clone(),
                reviewer_count: pr.assigned_reviewers.len() as i64,
            })
            .collect();
        by_pull_request.sort_by(|a, b| {
            b.reviewer_count
                .cmp(&a.reviewer_count)
                .then_with(|| a.pull_request_id.cmp(&b.pull_request_id))
        });

        Ok(AssignmentStats {
            by_user,
            by_pull_request,
        })
    }
}

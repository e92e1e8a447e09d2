//! Reviewer assignment engine.
//!
//! Picks initial reviewers for new pull requests, replaces a single
//! reviewer, and plans and applies bulk reviewer swaps when several team
//! members are deactivated at once. Swap planning is a pure function over
//! already-loaded data; nothing is written until the whole plan succeeds.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{
    BulkDeactivateResult, PullRequest, ReassignResult, ReviewerReplacement, ReviewerSwap, Team,
    TeamPrReassignment,
};
use crate::services::activity_sync::ActivityHandle;
use crate::services::directory::ReviewerDirectory;
use crate::store::ReviewStore;

/// Round-robin queue of replacement candidates.
///
/// A taken candidate leaves the pool for good. A candidate rejected for
/// the current pull request moves to the back of the queue and stays
/// available for later draws.
#[derive(Debug, Clone, Default)]
pub struct ReviewerPool {
    queue: VecDeque<String>,
    available: HashSet<String>,
}

impl ReviewerPool {
    /// Build a pool from candidate ids, dropping empties and duplicates.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pool = Self::default();
        for id in ids {
            let id = id.into();
            if id.is_empty() || pool.available.contains(&id) {
                continue;
            }
            pool.available.insert(id.clone());
            pool.queue.push_back(id);
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Take the next candidate not in `exclude`.
    ///
    /// Makes at most one pass over the queue.
    pub fn take(&mut self, exclude: &HashSet<String>) -> Option<String> {
        if self.available.is_empty() {
            return None;
        }

        let mut attempts = self.queue.len();
        while attempts > 0 {
            attempts -= 1;
            let candidate = self.queue.pop_front()?;
            // Stale entry for a candidate already taken
            if !self.available.contains(&candidate) {
                continue;
            }
            if exclude.contains(&candidate) {
                self.queue.push_back(candidate);
                continue;
            }
            self.available.remove(&candidate);
            return Some(candidate);
        }
        None
    }
}

/// Swaps computed for a bulk deactivation, not yet applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSwapPlan {
    pub swaps: Vec<ReviewerSwap>,
    pub reassignments: Vec<TeamPrReassignment>,
    /// Replacement reviewers in the order they were drawn.
    pub replacement_ids: Vec<String>,
}

/// Trim ids, drop empties and duplicates, keep first-seen order.
pub fn normalize_targets(user_ids: &[String]) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(user_ids.len());
    for raw in user_ids {
        let id = raw.trim();
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        targets.push(id.to_string());
    }

    if targets.is_empty() {
        return Err(AppError::invalid_payload_field(
            "no valid user ids provided",
            "user_ids",
        ));
    }
    Ok(targets)
}

/// Fail with `NotFound` naming the first target that is not a team member.
pub fn ensure_targets_in_team(targets: &[String], team: &Team) -> Result<(), AppError> {
    match targets.iter().find(|id| !team.has_member(id)) {
        Some(id) => Err(AppError::not_found_with_id("User", id.as_str())),
        None => Ok(()),
    }
}

/// Active team members that are not being deactivated.
pub fn collect_replacement_candidates(team: &Team, targets: &[String]) -> Vec<String> {
    team.members
        .iter()
        .filter(|m| m.is_active && !targets.contains(&m.user_id))
        .map(|m| m.user_id.clone())
        .collect()
}

/// Plan a replacement for every targeted reviewer on `open_prs`.
///
/// A replacement is never already on the pull request (including picks
/// made earlier for the same pull request) and never its author. Fails
/// with `NoCandidate` for the first pull request the pool cannot serve.
pub fn plan_bulk_swaps(
    open_prs: &[PullRequest],
    targets: &[String],
    pool: &mut ReviewerPool,
) -> Result<BulkSwapPlan, AppError> {
    let target_set: HashSet<&str> = targets.iter().map(String::as_str).collect();
    let mut plan = BulkSwapPlan::default();

    for pr in open_prs {
        let mut assigned: HashSet<String> = pr.assigned_reviewers.iter().cloned().collect();
        assigned.insert(pr.author_id.clone());

        let mut replacements = Vec::new();
        for reviewer in &pr.assigned_reviewers {
            // Untargeted reviewers keep their slot
            if !target_set.contains(reviewer.as_str()) {
                continue;
            }

            let new_reviewer = pool
                .take(&assigned)
                .ok_or_else(|| AppError::no_candidate_for(&pr.pull_request_id))?;
            // The second slot on this PR must not draw the same person
            assigned.insert(new_reviewer.clone());

            plan.swaps.push(ReviewerSwap {
                pull_request_id: pr.pull_request_id.clone(),
                old_user_id: reviewer.clone(),
                new_user_id: new_reviewer.clone(),
            });
            replacements.push(ReviewerReplacement {
                old_user_id: reviewer.clone(),
                new_user_id: new_reviewer.clone(),
            });
            plan.replacement_ids.push(new_reviewer);
        }

        if !replacements.is_empty() {
            plan.reassignments.push(TeamPrReassignment {
                pull_request_id: pr.pull_request_id.clone(),
                replacements,
            });
        }
    }

    Ok(plan)
}

/// Reviewer selection and replacement on top of the directory and store.
pub struct AssignmentEngine {
    directory: Arc<ReviewerDirectory>,
    store: Arc<dyn ReviewStore>,
    activity: ActivityHandle,
}

impl AssignmentEngine {
    pub fn new(
        directory: Arc<ReviewerDirectory>,
        store: Arc<dyn ReviewStore>,
        activity: ActivityHandle,
    ) -> Self {
        Self {
            directory,
            store,
            activity,
        }
    }

    /// Up to two active members of `team_name`, never the author.
    pub async fn assign_reviewers(&self, team_name: &str, author_id: &str) -> Vec<String> {
        self.directory
            .pick_reviewers(team_name, PullRequest::MAX_REVIEWERS, &[author_id.to_string()])
            .await
    }

    /// Replace one reviewer of an open pull request with another member of
    /// the old reviewer's team.
    pub async fn reassign(
        &self,
        pull_request_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignResult, AppError> {
        let mut pr = self.store.get_pull_request(pull_request_id).await?;

        if pr.is_merged() {
            return Err(AppError::pr_merged(pull_request_id));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::not_assigned(pull_request_id, old_reviewer_id));
        }

        let team_name = self.directory.get_user_team(old_reviewer_id).await?;

        // Current reviewers, the one leaving and the author are all ineligible
        let mut exclude = pr.assigned_reviewers.clone();
        exclude.push(old_reviewer_id.to_string());
        exclude.push(pr.author_id.clone());

        let new_reviewer = match self.directory.find_replacement(&team_name, &exclude).await {
            Ok(id) => id,
            Err(AppError::NoCandidate { .. }) => {
                return Err(AppError::no_candidate_for(pull_request_id))
            }
            Err(e) => return Err(e),
        };

        pr.replace_reviewer(old_reviewer_id, &new_reviewer);
        self.store.save_pull_request(&pr).await?;

        log::info!(
            "Reassigned reviewer on {}: {} -> {}",
            pull_request_id,
            old_reviewer_id,
            new_reviewer
        );

        self.submit_activity(vec![old_reviewer_id.to_string()], true)
            .await;
        self.submit_activity(vec![new_reviewer.clone()], false).await;

        Ok(ReassignResult {
            pr,
            replaced_by: new_reviewer,
        })
    }

    /// Deactivate `user_ids` in `team_name` and hand their open reviews to
    /// other active team members, all in one store transaction.
    pub async fn plan_and_apply_bulk_swap(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<BulkDeactivateResult, AppError> {
        let team_name = team_name.trim();
        if team_name.is_empty() {
            return Err(AppError::invalid_payload_field(
                "team name is required",
                "team_name",
            ));
        }
        let targets = normalize_targets(user_ids)?;

        let team = self.directory.get_team(team_name).await?;
        ensure_targets_in_team(&targets, &team)?;

        // Plan entirely in memory; a NoCandidate here writes nothing
        let mut pool = ReviewerPool::new(collect_replacement_candidates(&team, &targets));
        let open_prs = self
            .store
            .find_open_pull_requests_by_reviewers(&targets)
            .await?;
        let plan = plan_bulk_swaps(&open_prs, &targets, &mut pool)?;

        // Replacements are busy now, same as on single reassignment
        let mut deactivate = targets.clone();
        deactivate.extend(plan.replacement_ids.iter().cloned());

        self.store
            .apply_bulk_reviewer_swaps_and_deactivate(&plan.swaps, &deactivate)
            .await?;

        // Cache follows only after the store committed
        self.directory.set_active(&deactivate, false).await;

        log::info!(
            "Bulk deactivated {} user(s) in {}, {} reviewer swap(s)",
            targets.len(),
            team_name,
            plan.swaps.len()
        );

        Ok(BulkDeactivateResult {
            team_name: team_name.to_string(),
            deactivated: targets,
            reassignments: plan.reassignments,
        })
    }

    /// Queue an activity change; failures are logged and swallowed.
    pub(crate) async fn submit_activity(&self, user_ids: Vec<String>, is_active: bool) {
        if let Err(e) = self.activity.submit(user_ids, is_active).await {
            log::warn!("Failed to queue activity update: {}", e);
        }
    }
}

//! In-memory reviewer directory.
//!
//! Caches user → {name, team, active flag} for fast reviewer lookups.
//! The cache is warmed lazily from the store when one is configured. A
//! single `RwLock` guards the whole map: lookups share it, mutations
//! take it exclusively.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{Team, TeamMember, User};
use crate::store::ReviewStore;

/// Cache of users used for reviewer selection.
pub struct ReviewerDirectory {
    users: RwLock<HashMap<String, User>>,
    store: Option<Arc<dyn ReviewStore>>,
}

impl ReviewerDirectory {
    /// Create a directory, optionally backed by a store.
    pub fn new(store: Option<Arc<dyn ReviewStore>>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Create a directory backed by `store`.
    pub fn with_store(store: Arc<dyn ReviewStore>) -> Self {
        Self::new(Some(store))
    }

    pub fn store(&self) -> Option<&Arc<dyn ReviewStore>> {
        self.store.as_ref()
    }

    fn require_store(&self) -> Result<&Arc<dyn ReviewStore>, AppError> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::not_configured("ReviewerDirectory"))
    }

    /// Load a user into the cache if it is not there yet.
    pub async fn warm(&self, user_id: &str) -> Result<(), AppError> {
        if self.users.read().await.contains_key(user_id) {
            return Ok(());
        }

        let store = self.require_store()?;
        let user = store.get_user(user_id).await?;

        self.users
            .write()
            .await
            .entry(user.user_id.clone())
            .or_insert(user);
        Ok(())
    }

    /// Up to `limit` active members of `team_name`, skipping `exclude`.
    ///
    /// The order is random; callers must not rely on it.
    pub async fn pick_reviewers(
        &self,
        team_name: &str,
        limit: usize,
        exclude: &[String],
    ) -> Vec<String> {
        let mut candidates: Vec<String> = {
            let users = self.users.read().await;
            users
                .values()
                .filter(|u| u.is_active && u.is_in_team(team_name))
                .filter(|u| !exclude.contains(&u.user_id))
                .map(|u| u.user_id.clone())
                .collect()
        };

        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(limit);
        candidates
    }

    /// Set the active flag for every cached id. Unknown ids are skipped.
    pub async fn set_active(&self, user_ids: &[String], is_active: bool) {
        let mut users = self.users.write().await;
        for user_id in user_ids {
            if let Some(user) = users.get_mut(user_id) {
                user.is_active = is_active;
            }
        }
    }

    /// An active member of `team_name` not in `exclude`.
    pub async fn find_replacement(
        &self,
        team_name: &str,
        exclude: &[String],
    ) -> Result<String, AppError> {
        let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        let candidates: Vec<String> = {
            let users = self.users.read().await;
            users
                .values()
                .filter(|u| u.is_active && u.is_in_team(team_name))
                .filter(|u| !excluded.contains(u.user_id.as_str()))
                .map(|u| u.user_id.clone())
                .collect()
        };

        candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(AppError::no_candidate)
    }

    /// Team of a user, from the cache or else the store.
    pub async fn get_user_team(&self, user_id: &str) -> Result<String, AppError> {
        if let Some(user) = self.users.read().await.get(user_id) {
            return user
                .team_name
                .clone()
                .ok_or_else(|| AppError::not_found_with_id("Team", format!("of user {}", user_id)));
        }

        let Some(store) = self.store.as_ref() else {
            return Err(AppError::not_found_with_id("User", user_id));
        };

        let user = store.get_user(user_id).await?;
        let team_name = user.team_name.clone();
        self.users
            .write()
            .await
            .entry(user.user_id.clone())
            .or_insert(user);

        team_name.ok_or_else(|| AppError::not_found_with_id("Team", format!("of user {}", user_id)))
    }

    /// Set a user's active flag in the cache and the store together.
    ///
    /// The write lock is held across the store call. If the store rejects
    /// the write, the cached flag is restored.
    pub async fn set_user_activity_durable(
        &self,
        user_id: &str,
        is_active: bool,
    ) -> Result<User, AppError> {
        let store = self.require_store()?;
        let mut users = self.users.write().await;

        // Users outside the cache are pulled in before the toggle
        if !users.contains_key(user_id) {
            let loaded = store.get_user(user_id).await?;
            users.insert(loaded.user_id.clone(), loaded);
        }
        let Some(user) = users.get_mut(user_id) else {
            return Err(AppError::not_found_with_id("User", user_id));
        };

        let previous = user.is_active;
        user.is_active = is_active;
        let updated = user.clone();

        if let Err(e) = store.save_user(&updated).await {
            // Still under the write lock, nobody has seen the new value
            if let Some(user) = users.get_mut(user_id) {
                user.is_active = previous;
            }
            return Err(e);
        }

        Ok(updated)
    }

    /// Register a team and its members.
    ///
    /// The store write happens first; the cache is only populated once it
    /// succeeds.
    pub async fn add_team(&self, team: &Team) -> Result<Team, AppError> {
        let team_name = team.team_name.trim();
        if team_name.is_empty() {
            return Err(AppError::invalid_payload_field(
                "team name must not be empty",
                "team_name",
            ));
        }

        // Ids are stored trimmed, the same form bulk deactivation looks up
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(team.members.len());
        for member in &team.members {
            let user_id = member.user_id.trim();
            if user_id.is_empty() {
                return Err(AppError::invalid_payload_field(
                    "member user_id must not be empty",
                    "members",
                ));
            }
            if !seen.insert(user_id.to_string()) {
                return Err(AppError::invalid_payload_field(
                    format!("duplicate member {}", user_id),
                    "members",
                ));
            }
            normalized.push(TeamMember {
                user_id: user_id.to_string(),
                ..member.clone()
            });
        }

        let team = Team {
            team_name: team_name.to_string(),
            members: normalized,
        };
        let members = team.users();

        match self.store.as_ref() {
            Some(store) => store.create_team_with_members(&team.team_name, &members).await?,
            None => log::warn!(
                "No store configured, team {} kept in memory only",
                team.team_name
            ),
        }

        let mut users = self.users.write().await;
        for user in members {
            users.insert(user.user_id.clone(), user);
        }

        Ok(team)
    }

    /// Get a team, preferring the store.
    ///
    /// Falls back to [`Self::team_from_cache`] when the store has no such
    /// team or no store is configured.
    pub async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        if let Some(store) = self.store.as_ref() {
            match store.get_team(team_name).await {
                Ok(team) => return Ok(team),
                Err(e) if e.is_not_found() => {
                    log::debug!("Team {} not in store, trying cache", team_name);
                }
                Err(e) => return Err(e),
            }
        }

        self.team_from_cache(team_name).await
    }

    /// Approximate team view rebuilt from cached users only.
    pub async fn team_from_cache(&self, team_name: &str) -> Result<Team, AppError> {
        let mut members: Vec<User> = {
            let users = self.users.read().await;
            users
                .values()
                .filter(|u| u.is_in_team(team_name))
                .cloned()
                .collect()
        };

        if members.is_empty() {
            return Err(AppError::not_found_with_id("Team", team_name));
        }

        members.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(Team {
            team_name: team_name.to_string(),
            members: members.iter().map(TeamMember::from).collect(),
        })
    }

    /// Cached active flag, if the user is cached.
    pub async fn is_active(&self, user_id: &str) -> Option<bool> {
        self.users.read().await.get(user_id).map(|u| u.is_active)
    }

    pub async fn cached_user(&self, user_id: &str) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }
}

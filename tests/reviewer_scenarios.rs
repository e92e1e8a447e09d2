//! End-to-end reviewer assignment scenarios against a SQLite store.
//!
//! Each test builds a fresh database in a temp dir and drives the
//! lifecycle manager the way the HTTP layer does. Activity flags are
//! updated in the background, so checks on them run after `flush()`.

use std::sync::Arc;

use review_roster_lib::config::DatabaseConfig;
use review_roster_lib::db;
use review_roster_lib::error::AppError;
use review_roster_lib::models::{PullRequest, Team, TeamMember};
use review_roster_lib::services::ReviewerDirectory;
use review_roster_lib::store::{ReviewStore, SqliteStore};
use review_roster_lib::AppContext;
use tempfile::{tempdir, TempDir};

async fn setup(team_name: &str, members: &[&str]) -> (TempDir, AppContext) {
    let dir = tempdir().unwrap();
    let config = DatabaseConfig::at(dir.path().join("test.db"));
    let pool = db::initialize(&config).await.unwrap();
    let context = AppContext::new(Arc::new(SqliteStore::new(pool)));

    context
        .directory
        .add_team(&Team {
            team_name: team_name.to_string(),
            members: members
                .iter()
                .map(|id| TeamMember::new(*id, id.to_uppercase(), true))
                .collect(),
        })
        .await
        .unwrap();

    (dir, context)
}

async fn stored_active(context: &AppContext, user_id: &str) -> bool {
    context.store.get_user(user_id).await.unwrap().is_active
}

#[tokio::test]
async fn test_create_assigns_both_teammates() {
    let (_dir, ctx) = setup("backend", &["a", "b", "c"]).await;

    let pr = ctx.manager.create("a", "Add search", "pr-1").await.unwrap();
    let mut reviewers = pr.assigned_reviewers.clone();
    reviewers.sort();
    assert_eq!(reviewers, vec!["b", "c"]);

    let stored = ctx.store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers);
    assert!(stored.is_open());

    ctx.activity.flush().await.unwrap();
    assert_eq!(ctx.directory.is_active("b").await, Some(false));
    assert_eq!(ctx.directory.is_active("c").await, Some(false));
    assert_eq!(ctx.directory.is_active("a").await, Some(true));
    assert!(!stored_active(&ctx, "b").await);
}

#[tokio::test]
async fn test_reassign_with_spare_member() {
    let (_dir, ctx) = setup("backend", &["a", "b", "c", "d"]).await;

    let pr = ctx.manager.create("a", "Refactor", "pr-1").await.unwrap();
    assert_eq!(pr.assigned_reviewers.len(), 2);
    ctx.activity.flush().await.unwrap();

    let old = pr.assigned_reviewers[0].clone();
    let spare = ["b", "c", "d"]
        .into_iter()
        .find(|id| !pr.has_reviewer(id))
        .unwrap();

    let result = ctx.manager.reassign("pr-1", &old).await.unwrap();
    assert_eq!(result.replaced_by, spare);
    assert_eq!(result.pr.assigned_reviewers.len(), 2);
    assert!(!result.pr.has_reviewer(&old));
    assert_eq!(result.pr.assigned_reviewers[0], spare);
    assert_eq!(
        ctx.store.get_pull_request("pr-1").await.unwrap().assigned_reviewers,
        result.pr.assigned_reviewers
    );

    ctx.activity.flush().await.unwrap();
    assert_eq!(ctx.directory.is_active(&old).await, Some(true));
    assert_eq!(ctx.directory.is_active(spare).await, Some(false));
}

#[tokio::test]
async fn test_reassign_without_spare_member() {
    let (_dir, ctx) = setup("backend", &["a", "b", "c"]).await;

    let pr = ctx.manager.create("a", "Refactor", "pr-1").await.unwrap();
    let old = pr.assigned_reviewers[0].clone();

    match ctx.manager.reassign("pr-1", &old).await {
        Err(AppError::NoCandidate { pull_request_id }) => {
            assert_eq!(pull_request_id.as_deref(), Some("pr-1"))
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(
        ctx.store.get_pull_request("pr-1").await.unwrap().assigned_reviewers,
        pr.assigned_reviewers
    );
}

#[tokio::test]
async fn test_merge_reactivates_reviewers_once() {
    let (_dir, ctx) = setup("backend", &["a", "b", "c"]).await;

    ctx.manager.create("a", "Feature", "pr-1").await.unwrap();
    ctx.activity.flush().await.unwrap();
    assert_eq!(ctx.directory.is_active("b").await, Some(false));

    let merged = ctx.manager.merge("pr-1").await.unwrap();
    assert!(merged.is_merged());
    ctx.activity.flush().await.unwrap();
    assert_eq!(ctx.directory.is_active("b").await, Some(true));
    assert_eq!(ctx.directory.is_active("c").await, Some(true));
    assert!(stored_active(&ctx, "c").await);

    // A second merge is a no-op and must not touch activity flags.
    ctx.directory
        .set_user_activity_durable("b", false)
        .await
        .unwrap();
    let again = ctx.manager.merge("pr-1").await.unwrap();
    assert_eq!(again.merged_at.map(|t| t.timestamp()), merged.merged_at.map(|t| t.timestamp()));
    ctx.activity.flush().await.unwrap();
    assert_eq!(ctx.directory.is_active("b").await, Some(false));

    assert!(matches!(
        ctx.manager.reassign("pr-1", "c").await,
        Err(AppError::PrMerged { .. })
    ));
}

#[tokio::test]
async fn test_list_for_reviewer_includes_merged() {
    let (_dir, ctx) = setup("backend", &["a", "b"]).await;

    ctx.manager.create("a", "One", "pr-1").await.unwrap();
    ctx.manager.merge("pr-1").await.unwrap();
    ctx.activity.flush().await.unwrap();
    ctx.manager.create("a", "Two", "pr-2").await.unwrap();

    let listed = ctx.manager.list_for_reviewer("b").await.unwrap();
    let mut ids: Vec<&str> = listed.iter().map(|p| p.pull_request_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["pr-1", "pr-2"]);

    let stats = ctx.manager.assignment_stats().await.unwrap();
    assert_eq!(stats.by_user[0].user_id, "b");
    assert_eq!(stats.by_user[0].username, "B");
    assert_eq!(stats.by_user[0].assignments, 2);
}

#[tokio::test]
async fn test_team_round_trip_store_and_cache() {
    let (_dir, ctx) = setup("backend", &["b", "a"]).await;

    let team = ctx.directory.get_team("backend").await.unwrap();
    assert_eq!(
        team.members,
        vec![TeamMember::new("a", "A", true), TeamMember::new("b", "B", true)]
    );

    let cache_only = ReviewerDirectory::new(None);
    cache_only.add_team(&team).await.unwrap();
    assert_eq!(cache_only.get_team("backend").await.unwrap(), team);
    assert_eq!(cache_only.team_from_cache("backend").await.unwrap(), team);

    assert!(matches!(
        ctx.directory.add_team(&team).await,
        Err(AppError::AlreadyExists { .. })
    ));
}

#[tokio::test]
async fn test_store_rejects_oversized_reviewer_set() {
    let (_dir, ctx) = setup("backend", &["a", "b", "c", "d"]).await;

    let pr = PullRequest::new_open(
        "pr-1",
        "Too many",
        "a",
        vec!["b".to_string(), "c".to_string(), "d".to_string()],
    );
    assert!(matches!(
        ctx.store.save_pull_request(&pr).await,
        Err(AppError::InvalidPayload { .. })
    ));
    assert!(ctx
        .store
        .get_pull_request("pr-1")
        .await
        .unwrap_err()
        .is_not_found());
}

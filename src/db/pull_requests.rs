//! Database queries for pull requests and their reviewers.
//!
//! Reviewer sets live in `pull_request_reviewers`, one row per reviewer,
//! read back in insertion order. Every write touching more than one row
//! runs inside a single transaction.

use crate::db::pool::DbPool;
use crate::db::users;
use crate::error::AppError;
use crate::models::{
    AssignmentStats, PullRequest, PullRequestAssignmentStat, PullRequestStatus, ReviewerSwap,
    UserAssignmentStat,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

/// Row shape of the `pull_requests` table.
#[derive(Debug, FromRow)]
struct PullRequestRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    created_at: Option<i64>,
    merged_at: Option<i64>,
}

impl PullRequestRow {
    fn into_model(self, assigned_reviewers: Vec<String>) -> PullRequest {
        PullRequest {
            pull_request_id: self.pull_request_id,
            pull_request_name: self.pull_request_name,
            author_id: self.author_id,
            status: PullRequestStatus::from(self.status.as_str()),
            assigned_reviewers,
            created_at: self.created_at.and_then(from_unix),
            merged_at: self.merged_at.and_then(from_unix),
        }
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

async fn load_reviewers(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT user_id FROM pull_request_reviewers WHERE pull_request_id = ? ORDER BY rowid",
    )
    .bind(pull_request_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn attach_reviewers(
    conn: &mut SqliteConnection,
    rows: Vec<PullRequestRow>,
) -> Result<Vec<PullRequest>, AppError> {
    let mut prs = Vec::with_capacity(rows.len());
    for row in rows {
        let reviewers = load_reviewers(conn, &row.pull_request_id).await?;
        prs.push(row.into_model(reviewers));
    }
    Ok(prs)
}

async fn replace_reviewers(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    reviewers: &[String],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM pull_request_reviewers WHERE pull_request_id = ?")
        .bind(pull_request_id)
        .execute(&mut *conn)
        .await?;

    for reviewer in reviewers {
        sqlx::query("INSERT INTO pull_request_reviewers (pull_request_id, user_id) VALUES (?, ?)")
            .bind(pull_request_id)
            .bind(reviewer)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::store_with_op(
                    e.to_string(),
                    format!("insert reviewer {} for {}", reviewer, pull_request_id),
                )
            })?;
    }

    Ok(())
}

/// Insert a new pull request with its reviewers.
///
/// Fails with `AlreadyExists` if the id is taken.
pub async fn create_pull_request(pool: &DbPool, pr: &PullRequest) -> Result<(), AppError> {
    let reviewers = pr.normalized_reviewers()?;
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(pull_request_id) DO NOTHING
        "#,
    )
    .bind(&pr.pull_request_id)
    .bind(&pr.pull_request_name)
    .bind(&pr.author_id)
    .bind(pr.status.to_string())
    .bind(pr.created_at.map(|t| t.timestamp()))
    .bind(pr.merged_at.map(|t| t.timestamp()))
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::already_exists("PullRequest", &pr.pull_request_id));
    }

    replace_reviewers(&mut tx, &pr.pull_request_id, &reviewers).await?;
    tx.commit().await?;

    Ok(())
}

/// Upsert a pull request and replace its entire reviewer set.
pub async fn save_pull_request(pool: &DbPool, pr: &PullRequest) -> Result<(), AppError> {
    let reviewers = pr.normalized_reviewers()?;
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(pull_request_id) DO UPDATE SET
            pull_request_name = excluded.pull_request_name,
            author_id = excluded.author_id,
            status = excluded.status,
            created_at = excluded.created_at,
            merged_at = excluded.merged_at
        "#,
    )
    .bind(&pr.pull_request_id)
    .bind(&pr.pull_request_name)
    .bind(&pr.author_id)
    .bind(pr.status.to_string())
    .bind(pr.created_at.map(|t| t.timestamp()))
    .bind(pr.merged_at.map(|t| t.timestamp()))
    .execute(&mut *tx)
    .await?;

    replace_reviewers(&mut tx, &pr.pull_request_id, &reviewers).await?;
    tx.commit().await?;

    Ok(())
}

/// Get a pull request with its reviewers.
///
/// # Returns
/// The pull request, or `NotFound` if it does not exist
pub async fn get_pull_request(pool: &DbPool, pull_request_id: &str) -> Result<PullRequest, AppError> {
    let mut conn = pool.acquire().await?;

    let row = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at
        FROM pull_requests
        WHERE pull_request_id = ?
        "#,
    )
    .bind(pull_request_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Err(AppError::not_found_with_id("PullRequest", pull_request_id));
    };

    let reviewers = load_reviewers(&mut conn, pull_request_id).await?;
    Ok(row.into_model(reviewers))
}

/// Find all pull requests (any status) where the user is a reviewer, newest first.
pub async fn find_pull_requests_by_reviewer(
    pool: &DbPool,
    reviewer_id: &str,
) -> Result<Vec<PullRequest>, AppError> {
    let mut conn = pool.acquire().await?;

    let rows = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT p.pull_request_id, p.pull_request_name, p.author_id, p.status, p.created_at, p.merged_at
        FROM pull_requests p
        JOIN pull_request_reviewers r ON r.pull_request_id = p.pull_request_id
        WHERE r.user_id = ?
        ORDER BY p.created_at DESC, p.pull_request_id
        "#,
    )
    .bind(reviewer_id)
    .fetch_all(&mut *conn)
    .await?;

    attach_reviewers(&mut conn, rows).await
}

/// Find open pull requests with at least one reviewer in `reviewer_ids`,
/// oldest first.
pub async fn find_open_pull_requests_by_reviewers(
    pool: &DbPool,
    reviewer_ids: &[String],
) -> Result<Vec<PullRequest>, AppError> {
    let mut ids: Vec<&str> = Vec::with_capacity(reviewer_ids.len());
    for id in reviewer_ids {
        if !id.is_empty() && !ids.contains(&id.as_str()) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    // SQLite has no array binding, so expand one placeholder per id
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT p.pull_request_id, p.pull_request_name, p.author_id, p.status, p.created_at, p.merged_at
        FROM pull_requests p
        WHERE p.status = 'OPEN'
          AND EXISTS (
              SELECT 1 FROM pull_request_reviewers r
              WHERE r.pull_request_id = p.pull_request_id
                AND r.user_id IN ({})
          )
        ORDER BY p.created_at ASC, p.pull_request_id
        "#,
        placeholders
    );

    let mut conn = pool.acquire().await?;
    let mut query = sqlx::query_as::<_, PullRequestRow>(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    attach_reviewers(&mut conn, rows).await
}

/// Apply reviewer swaps and deactivate users in one transaction.
///
/// A swap whose old reviewer is no longer on the pull request aborts the
/// whole transaction, so a concurrent change can never push a reviewer set
/// past its limit.
pub async fn apply_bulk_reviewer_swaps_and_deactivate(
    pool: &DbPool,
    swaps: &[ReviewerSwap],
    users_to_deactivate: &[String],
) -> Result<(), AppError> {
    if swaps.is_empty() && users_to_deactivate.is_empty() {
        return Ok(());
    }

    // Any early return drops `tx`, which rolls the whole batch back
    let mut tx = pool.begin().await?;

    for swap in swaps {
        if swap.pull_request_id.is_empty() || swap.old_user_id.is_empty() || swap.new_user_id.is_empty() {
            return Err(AppError::invalid_payload(format!(
                "invalid reviewer swap: {:?}",
                swap
            )));
        }

        let deleted = sqlx::query(
            "DELETE FROM pull_request_reviewers WHERE pull_request_id = ? AND user_id = ?",
        )
        .bind(&swap.pull_request_id)
        .bind(&swap.old_user_id)
        .execute(&mut *tx)
        .await?;

        // The plan was built from a read outside this transaction
        if deleted.rows_affected() == 0 {
            return Err(AppError::store_with_op(
                format!(
                    "reviewer {} is no longer assigned to {}",
                    swap.old_user_id, swap.pull_request_id
                ),
                "apply_bulk_reviewer_swaps",
            ));
        }

        sqlx::query("INSERT INTO pull_request_reviewers (pull_request_id, user_id) VALUES (?, ?)")
            .bind(&swap.pull_request_id)
            .bind(&swap.new_user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::store_with_op(
                    e.to_string(),
                    format!("insert reviewer {} for {}", swap.new_user_id, swap.pull_request_id),
                )
            })?;
    }

    // Targets and their replacements both go inactive
    users::set_active_in(&mut tx, users_to_deactivate, false).await?;

    tx.commit().await?;

    Ok(())
}

/// Count reviewer assignments per user and per pull request.
pub async fn assignment_stats(pool: &DbPool) -> Result<AssignmentStats, AppError> {
    let by_user = sqlx::query_as::<_, UserAssignmentStat>(
        r#"
        SELECT r.user_id AS user_id,
               COALESCE(u.username, '') AS username,
               COUNT(*) AS assignments
        FROM pull_request_reviewers r
        LEFT JOIN users u ON u.user_id = r.user_id
        GROUP BY r.user_id, u.username
        ORDER BY assignments DESC, r.user_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_pull_request = sqlx::query_as::<_, PullRequestAssignmentStat>(
        r#"
        SELECT p.pull_request_id AS pull_request_id,
               p.pull_request_name AS pull_request_name,
               COUNT(r.user_id) AS reviewer_count
        FROM pull_requests p
        LEFT JOIN pull_request_reviewers r ON r.pull_request_id = p.pull_request_id
        GROUP BY p.pull_request_id, p.pull_request_name
        ORDER BY reviewer_count DESC, p.pull_request_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(AssignmentStats {
        by_user,
        by_pull_request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::teams;
    use crate::db::test_support::setup_test_db;
    use crate::models::User;

    async fn seed_users(pool: &DbPool, ids: &[&str]) {
        let members: Vec<User> = ids
            .iter()
            .map(|id| User::new(*id, id.to_uppercase(), Some("core".to_string()), true))
            .collect();
        teams::create_team_with_members(pool, "core", &members)
            .await
            .unwrap();
    }

    fn pr(id: &str, reviewers: &[&str]) -> PullRequest {
        PullRequest::new_open(
            id,
            format!("Title {}", id),
            "a",
            reviewers.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let (_dir, pool) = setup_test_db().await;

        let created = pr("pr-1", &["c", "b"]);
        create_pull_request(&pool, &created).await.unwrap();

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(loaded.assigned_reviewers, vec!["c", "b"]);
        assert_eq!(loaded.status, PullRequestStatus::Open);
        assert_eq!(
            loaded.created_at.map(|t| t.timestamp()),
            created.created_at.map(|t| t.timestamp())
        );
        assert_eq!(loaded.merged_at, None);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_conflicts() {
        let (_dir, pool) = setup_test_db().await;

        create_pull_request(&pool, &pr("pr-1", &["b"])).await.unwrap();
        let err = create_pull_request(&pool, &pr("pr-1", &["c"])).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(loaded.assigned_reviewers, vec!["b"]);
    }

    #[tokio::test]
    async fn test_save_replaces_reviewer_set() {
        let (_dir, pool) = setup_test_db().await;

        let mut pull = pr("pr-1", &["b", "c"]);
        save_pull_request(&pool, &pull).await.unwrap();

        pull.assigned_reviewers = vec!["d".to_string()];
        pull.mark_merged(Utc::now());
        save_pull_request(&pool, &pull).await.unwrap();

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(loaded.assigned_reviewers, vec!["d"]);
        assert!(loaded.is_merged());
        assert!(loaded.merged_at.is_some());
    }

    #[tokio::test]
    async fn test_save_rejects_three_reviewers() {
        let (_dir, pool) = setup_test_db().await;

        let err = save_pull_request(&pool, &pr("pr-1", &["b", "c", "d"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload { .. }));
        assert!(get_pull_request(&pool, "pr-1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_find_by_reviewer_includes_merged() {
        let (_dir, pool) = setup_test_db().await;

        save_pull_request(&pool, &pr("pr-1", &["b"])).await.unwrap();
        let mut merged = pr("pr-2", &["b", "c"]);
        merged.mark_merged(Utc::now());
        save_pull_request(&pool, &merged).await.unwrap();
        save_pull_request(&pool, &pr("pr-3", &["c"])).await.unwrap();

        let found = find_pull_requests_by_reviewer(&pool, "b").await.unwrap();
        let mut ids: Vec<&str> = found.iter().map(|p| p.pull_request_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["pr-1", "pr-2"]);
        let pr2 = found.iter().find(|p| p.pull_request_id == "pr-2").unwrap();
        assert_eq!(pr2.assigned_reviewers, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_find_open_by_reviewers_filters_status() {
        let (_dir, pool) = setup_test_db().await;

        save_pull_request(&pool, &pr("pr-1", &["x", "b"])).await.unwrap();
        save_pull_request(&pool, &pr("pr-2", &["y"])).await.unwrap();
        let mut merged = pr("pr-3", &["x"]);
        merged.mark_merged(Utc::now());
        save_pull_request(&pool, &merged).await.unwrap();
        save_pull_request(&pool, &pr("pr-4", &["z"])).await.unwrap();

        let found = find_open_pull_requests_by_reviewers(
            &pool,
            &["x".to_string(), "y".to_string(), "x".to_string()],
        )
        .await
        .unwrap();
        let mut ids: Vec<&str> = found.iter().map(|p| p.pull_request_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["pr-1", "pr-2"]);

        assert!(find_open_pull_requests_by_reviewers(&pool, &[])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_bulk_swap_applies_atomically() {
        let (_dir, pool) = setup_test_db().await;
        seed_users(&pool, &["x", "y", "z", "w"]).await;
        save_pull_request(&pool, &pr("pr-1", &["x", "y"])).await.unwrap();

        let swaps = vec![ReviewerSwap {
            pull_request_id: "pr-1".to_string(),
            old_user_id: "x".to_string(),
            new_user_id: "z".to_string(),
        }];
        apply_bulk_reviewer_swaps_and_deactivate(&pool, &swaps, &["x".to_string(), "z".to_string()])
            .await
            .unwrap();

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap();
        assert!(loaded.has_reviewer("z"));
        assert!(loaded.has_reviewer("y"));
        assert!(!loaded.has_reviewer("x"));
        assert!(!users::get_user(&pool, "x").await.unwrap().is_active);
        assert!(!users::get_user(&pool, "z").await.unwrap().is_active);
        assert!(users::get_user(&pool, "w").await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_bulk_swap_rolls_back_on_stale_swap() {
        let (_dir, pool) = setup_test_db().await;
        seed_users(&pool, &["x", "y", "z", "w"]).await;
        save_pull_request(&pool, &pr("pr-1", &["x"])).await.unwrap();
        save_pull_request(&pool, &pr("pr-2", &["y"])).await.unwrap();

        let swaps = vec![
            ReviewerSwap {
                pull_request_id: "pr-1".to_string(),
                old_user_id: "x".to_string(),
                new_user_id: "z".to_string(),
            },
            ReviewerSwap {
                pull_request_id: "pr-2".to_string(),
                old_user_id: "x".to_string(),
                new_user_id: "w".to_string(),
            },
        ];
        let err = apply_bulk_reviewer_swaps_and_deactivate(&pool, &swaps, &["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store { .. }));

        assert_eq!(
            get_pull_request(&pool, "pr-1").await.unwrap().assigned_reviewers,
            vec!["x"]
        );
        assert!(users::get_user(&pool, "x").await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_assignment_stats() {
        let (_dir, pool) = setup_test_db().await;
        seed_users(&pool, &["b", "c"]).await;
        save_pull_request(&pool, &pr("pr-1", &["b", "c"])).await.unwrap();
        save_pull_request(&pool, &pr("pr-2", &["b"])).await.unwrap();
        save_pull_request(&pool, &pr("pr-3", &[])).await.unwrap();

        let stats = assignment_stats(&pool).await.unwrap();
        assert_eq!(
            stats.by_user,
            vec![
                UserAssignmentStat {
                    user_id: "b".to_string(),
                    username: "B".to_string(),
                    assignments: 2,
                },
                UserAssignmentStat {
                    user_id: "c".to_string(),
                    username: "C".to_string(),
                    assignments: 1,
                },
            ]
        );
        assert_eq!(stats.by_pull_request.len(), 3);
        assert_eq!(stats.by_pull_request[0].pull_request_id, "pr-1");
        assert_eq!(stats.by_pull_request[0].reviewer_count, 2);
        assert_eq!(stats.by_pull_request[2].reviewer_count, 0);
    }
}

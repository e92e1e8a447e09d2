//! Database queries for teams.

use crate::db::pool::DbPool;
use crate::db::users;
use crate::error::AppError;
use crate::models::{Team, TeamMember, User};

/// Create a team row without members.
///
/// Fails with `AlreadyExists` if the name is taken.
pub async fn save_team(pool: &DbPool, team_name: &str) -> Result<(), AppError> {
    let result = sqlx::query("INSERT INTO teams (team_name) VALUES (?) ON CONFLICT(team_name) DO NOTHING")
        .bind(team_name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::already_exists("Team", team_name));
    }

    Ok(())
}

/// Create a team and upsert all its members in one transaction.
///
/// Existing users are moved into the team. Nothing is written if the team
/// name is taken or any member fails to save.
pub async fn create_team_with_members(
    pool: &DbPool,
    team_name: &str,
    members: &[User],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("INSERT INTO teams (team_name) VALUES (?) ON CONFLICT(team_name) DO NOTHING")
        .bind(team_name)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::already_exists("Team", team_name));
    }

    for user in members {
        users::upsert_user(&mut tx, user).await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Get a team with its members.
///
/// # Returns
/// The team, or `NotFound` if the team row does not exist
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT team_name FROM teams WHERE team_name = ?")
        .bind(team_name)
        .fetch_optional(pool)
        .await?;

    let Some((team_name,)) = exists else {
        return Err(AppError::not_found_with_id("Team", team_name));
    };

    let members = users::get_users_in_team(pool, &team_name)
        .await?
        .iter()
        .map(TeamMember::from)
        .collect();

    Ok(Team { team_name, members })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    fn members(team: &str) -> Vec<User> {
        vec![
            User::new("u1", "Alice", Some(team.to_string()), true),
            User::new("u2", "Bob", Some(team.to_string()), false),
        ]
    }

    #[tokio::test]
    async fn test_create_and_get_team() {
        let (_dir, pool) = setup_test_db().await;

        create_team_with_members(&pool, "backend", &members("backend"))
            .await
            .unwrap();

        let team = get_team(&pool, "backend").await.unwrap();
        assert_eq!(team.team_name, "backend");
        assert_eq!(
            team.members,
            vec![
                TeamMember::new("u1", "Alice", true),
                TeamMember::new("u2", "Bob", false),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_team_rolls_back_members() {
        let (_dir, pool) = setup_test_db().await;
        save_team(&pool, "backend").await.unwrap();

        let err = create_team_with_members(&pool, "backend", &members("backend"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_save_team_twice_conflicts() {
        let (_dir, pool) = setup_test_db().await;

        save_team(&pool, "qa").await.unwrap();
        assert!(matches!(
            save_team(&pool, "qa").await,
            Err(AppError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_missing_team() {
        let (_dir, pool) = setup_test_db().await;

        assert!(get_team(&pool, "nope").await.unwrap_err().is_not_found());
    }
}

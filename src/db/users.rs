//! Database queries for users.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::User;
use sqlx::SqliteConnection;

const UPSERT_USER: &str = r#"
    INSERT INTO users (user_id, username, is_active, team_name)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        username = excluded.username,
        is_active = excluded.is_active,
        team_name = excluded.team_name
"#;

/// Insert or update a user inside an open connection or transaction.
pub(crate) async fn upsert_user(conn: &mut SqliteConnection, user: &User) -> Result<(), AppError> {
    sqlx::query(UPSERT_USER)
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(user.is_active)
        .bind(&user.team_name)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::store_with_op(e.to_string(), format!("upsert user {}", user.user_id)))?;

    Ok(())
}

/// Set `is_active` for each id inside an open transaction. Unknown ids are ignored.
pub(crate) async fn set_active_in(
    conn: &mut SqliteConnection,
    user_ids: &[String],
    is_active: bool,
) -> Result<(), AppError> {
    for user_id in user_ids {
        if user_id.is_empty() {
            continue;
        }
        sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
            .bind(is_active)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Insert or update a single user.
pub async fn save_user(pool: &DbPool, user: &User) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    upsert_user(&mut conn, user).await
}

/// Get a user by id.
///
/// # Returns
/// The user, or `NotFound` if no such user exists
pub async fn get_user(pool: &DbPool, user_id: &str) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

/// Get all users of a team, ordered by username.
pub async fn get_users_in_team(pool: &DbPool, team_name: &str) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, username, team_name, is_active
        FROM users
        WHERE team_name = ?
        ORDER BY username, user_id
        "#,
    )
    .bind(team_name)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Set the active flag of several users in one transaction.
pub async fn set_users_active(
    pool: &DbPool,
    user_ids: &[String],
    is_active: bool,
) -> Result<(), AppError> {
    if user_ids.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    set_active_in(&mut tx, user_ids, is_active).await?;
    tx.commit().await?;

    Ok(())
}

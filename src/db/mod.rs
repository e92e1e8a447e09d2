//! Database layer for SQLite storage.
//!
//! This module handles all database operations including:
//! - Connection pool setup from [`DatabaseConfig`]
//! - Schema migrations tracked in `_migrations`
//! - Query helpers for users, teams and pull requests

pub mod pool;
pub mod pull_requests;
pub mod teams;
pub mod users;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::DatabaseConfig;
use pool::DbPool;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Migrations in application order, as `(name, sql)`.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial_schema",
    include_str!("migrations/0001_initial_schema.sql"),
)];

/// Resolve the database file path inside a data directory.
pub fn get_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("review-roster.db")
}

/// Create the database directory, open the pool and apply pending
/// migrations.
pub async fn initialize(config: &DatabaseConfig) -> Result<DbPool, DbError> {
    // SQLite creates the file but not the directories above it
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Migration(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let pool = pool::create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Apply every migration not yet recorded in `_migrations`.
///
/// Each migration runs in its own transaction together with its
/// bookkeeping row, so a failing file leaves no partial schema behind.
async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (name TEXT PRIMARY KEY, applied_at INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;

    for (name, migration_sql) in MIGRATIONS.iter().copied() {
        let mut tx = pool.begin().await?;

        let applied: Option<(String,)> =
            sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?;
        if applied.is_some() {
            continue;
        }

        log::info!("[db] Applying migration {}", name);

        // Migration files hold several statements; raw_sql runs them all
        sqlx::raw_sql(migration_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("{} failed: {}", name, e)))?;

        sqlx::query("INSERT INTO _migrations (name, applied_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_initialize_creates_schema_and_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("data/nested/test.db");

        let pool = initialize(&DatabaseConfig::at(&db_path)).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            table_names,
            vec!["pull_request_reviewers", "pull_requests", "teams", "users"]
        );
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::at(dir.path().join("test.db"));

        let _first = initialize(&config).await.unwrap();
        let second = initialize(&config).await.unwrap();

        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM _migrations ORDER BY name")
            .fetch_all(&second)
            .await
            .unwrap();
        assert_eq!(names.len(), MIGRATIONS.len());
        assert_eq!(names[0].0, MIGRATIONS[0].0);
    }
}

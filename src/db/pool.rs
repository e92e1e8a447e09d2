//! SQLite connection pool.
//!
//! One WAL-mode pool per process, sized and timed from [`DatabaseConfig`].

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// Per-connection settings for the configured database file.
fn connect_options(config: &DatabaseConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(&config.path)
        // First start creates an empty file; migrations fill it
        .create_if_missing(true)
        // Reads keep going while a bulk swap commits
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Reviewer rows cascade with their pull request
        .foreign_keys(true)
        // Wait for the write lock instead of failing with SQLITE_BUSY
        .busy_timeout(config.busy_timeout())
}

/// Open the pool described by `config`.
///
/// The parent directory must already exist; see [`super::initialize`].
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        // A checkout never waits longer than SQLite itself would on the lock
        .acquire_timeout(config.busy_timeout())
        .connect_with(connect_options(config))
        .await?;

    log::debug!(
        "[db] Pool ready for {} (max {} connections)",
        config.path.display(),
        config.max_connections
    );

    Ok(pool)
}

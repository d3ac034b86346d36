//! # Database Store
//!
//! Connection pool, embedded migrations, and repositories for rooms and messages.
//!
//! Uniqueness and ordering are enforced by the schema: the sorted participant
//! pair is a `UNIQUE` key, and message timestamps are assigned by the database
//! at insert time.

// region: --- Modules
pub mod models;
pub mod room_repository;
pub mod message_repository;
// endregion: --- Modules

// region: --- Re-exports
pub use models::{Message, Room};
pub use room_repository::RoomRepository;
pub use message_repository::MessageRepository;
// endregion: --- Re-exports

// region: --- Types and Functions
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Type alias for SQLite connection pool.
pub type DbPool = SqlitePool;

/// Create a new SQLite connection pool for `database_url`.
///
/// In-memory databases are private to a connection, so they get a single
/// connection that is never recycled.
pub async fn create_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
// endregion: --- Types and Functions

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh migrated in-memory store.
    pub async fn setup_test_db() -> DbPool {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        migrate(&pool).await.expect("Failed to run migrations");
        pool
    }

    /// Fresh migrated store in a temporary file, served by a multi-connection
    /// pool. The directory is removed when the returned guard drops.
    pub async fn setup_file_db() -> (DbPool, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("chat.db").display());
        let pool = create_pool(&url).await.expect("Failed to create test database");
        migrate(&pool).await.expect("Failed to run migrations");
        (pool, dir)
    }
}

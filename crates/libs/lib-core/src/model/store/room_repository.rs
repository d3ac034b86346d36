//! # Room Repository
//!
//! Idempotent room creation and lookup.
//!
//! ## Example
//!
//! ```rust,no_run
//! # use lib_core::model::store::{create_pool, migrate, RoomRepository};
//! # async fn example() -> anyhow::Result<()> {
//! let pool = create_pool("sqlite::memory:").await?;
//! migrate(&pool).await?;
//!
//! let (room, created) = RoomRepository::get_or_create(&pool, "5", "3").await?;
//! assert!(created);
//! assert_eq!((room.participant_a.as_str(), room.participant_b.as_str()), ("3", "5"));
//! # Ok(())
//! # }
//! ```

use super::models::Room;
use super::DbPool;
use sqlx::query_as;

/// Room repository for database operations.
pub struct RoomRepository;

impl RoomRepository {
    /// Return the room for the unordered pair `(a, b)`, creating it if needed.
    ///
    /// The boolean is `true` when this call inserted the row. Concurrent calls
    /// for the same pair race on the `UNIQUE` constraint, so exactly one row
    /// exists and exactly one caller sees `true`.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when `a == b` (schema `CHECK`) or the database fails.
    pub async fn get_or_create(pool: &DbPool, a: &str, b: &str) -> Result<(Room, bool), sqlx::Error> {
        let (participant_a, participant_b) = Room::normalize_pair(a, b);

        let inserted = query_as::<_, Room>(
            r#"
            INSERT INTO rooms (participant_a, participant_b)
            VALUES (?, ?)
            ON CONFLICT (participant_a, participant_b) DO NOTHING
            RETURNING id, participant_a, participant_b, created_at
            "#,
        )
        .bind(participant_a)
        .bind(participant_b)
        .fetch_optional(pool)
        .await?;

        if let Some(room) = inserted {
            return Ok((room, true));
        }

        let existing = query_as::<_, Room>(
            r#"
            SELECT id, participant_a, participant_b, created_at
            FROM rooms
            WHERE participant_a = ? AND participant_b = ?
            "#,
        )
        .bind(participant_a)
        .bind(participant_b)
        .fetch_one(pool)
        .await?;

        Ok((existing, false))
    }

    /// Find a room by id.
    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Room>, sqlx::Error> {
        query_as::<_, Room>(
            "SELECT id, participant_a, participant_b, created_at FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Count rooms for the unordered pair. Used for invariant checks.
    pub async fn count_for_pair(pool: &DbPool, a: &str, b: &str) -> Result<i64, sqlx::Error> {
        let (participant_a, participant_b) = Room::normalize_pair(a, b);
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM rooms WHERE participant_a = ? AND participant_b = ?",
        )
        .bind(participant_a)
        .bind(participant_b)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::test_support::{setup_file_db, setup_test_db};

    #[tokio::test]
    async fn test_get_or_create_is_order_insensitive() {
        let pool = setup_test_db().await;

        let (first, created_first) = RoomRepository::get_or_create(&pool, "a", "b").await.unwrap();
        let (second, created_second) = RoomRepository::get_or_create(&pool, "b", "a").await.unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first, second);
        assert_eq!(first.participant_a, "a");
        assert_eq!(first.participant_b, "b");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_row() {
        let (pool, _dir) = setup_file_db().await;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        RoomRepository::get_or_create(&pool, "7", "11").await
                    } else {
                        RoomRepository::get_or_create(&pool, "11", "7").await
                    }
                })
            })
            .collect();
        let results: Vec<_> = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.expect("task should not panic"))
            .collect();

        let created = results
            .iter()
            .filter(|r| matches!(r, Ok((_, true))))
            .count();
        let ids: std::collections::HashSet<i64> = results
            .into_iter()
            .map(|r| r.expect("get_or_create should succeed").0.id)
            .collect();

        assert_eq!(created, 1);
        assert_eq!(ids.len(), 1);
        assert_eq!(RoomRepository::count_for_pair(&pool, "7", "11").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_participant_twice_is_rejected() {
        let pool = setup_test_db().await;
        assert!(RoomRepository::get_or_create(&pool, "x", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let pool = setup_test_db().await;
        let (room, _) = RoomRepository::get_or_create(&pool, "1", "2").await.unwrap();

        assert_eq!(RoomRepository::find_by_id(&pool, room.id).await.unwrap(), Some(room));
        assert_eq!(RoomRepository::find_by_id(&pool, 9999).await.unwrap(), None);
    }
}

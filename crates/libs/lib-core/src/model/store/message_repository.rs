//! # Message Repository
//!
//! Message persistence. Timestamps are assigned by the database at insert.

use super::models::Message;
use super::DbPool;
use sqlx::query_as;

/// Message repository for database operations.
pub struct MessageRepository;

impl MessageRepository {
    /// Insert a message and return the stored row.
    ///
    /// `content` is stored as given; callers trim and reject empty content first.
    /// The schema also rejects blank content.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the room does not exist (foreign key), the
    /// content is blank, or the database fails.
    pub async fn create(
        pool: &DbPool,
        room_id: i64,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        query_as::<_, Message>(
            r#"
            INSERT INTO messages (room_id, sender_id, content)
            VALUES (?, ?, ?)
            RETURNING id, room_id, sender_id, content, timestamp, is_read
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// All messages of a room, oldest first.
    pub async fn list_for_room(pool: &DbPool, room_id: i64) -> Result<Vec<Message>, sqlx::Error> {
        query_as::<_, Message>(
            r#"
            SELECT id, room_id, sender_id, content, timestamp, is_read
            FROM messages
            WHERE room_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::test_support::setup_test_db;
    use crate::model::store::RoomRepository;

    #[tokio::test]
    async fn test_create_and_list_in_order() {
        let pool = setup_test_db().await;
        let (room, _) = RoomRepository::get_or_create(&pool, "alice", "bob").await.unwrap();

        let first = MessageRepository::create(&pool, room.id, "alice", "hi").await.unwrap();
        let second = MessageRepository::create(&pool, room.id, "bob", "hey").await.unwrap();

        assert_eq!(first.sender_id, "alice");
        assert_eq!(first.room_id, room.id);
        assert!(!first.is_read);
        assert!(second.timestamp >= first.timestamp);

        let listed = MessageRepository::list_for_room(&pool, room.id).await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn test_messages_are_scoped_to_room() {
        let pool = setup_test_db().await;
        let (r1, _) = RoomRepository::get_or_create(&pool, "a", "b").await.unwrap();
        let (r2, _) = RoomRepository::get_or_create(&pool, "a", "c").await.unwrap();

        MessageRepository::create(&pool, r1.id, "a", "one").await.unwrap();
        MessageRepository::create(&pool, r2.id, "a", "two").await.unwrap();

        let listed = MessageRepository::list_for_room(&pool, r1.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "one");
    }

    #[tokio::test]
    async fn test_unknown_room_and_blank_content_fail() {
        let pool = setup_test_db().await;
        assert!(MessageRepository::create(&pool, 404, "a", "hello").await.is_err());

        let (room, _) = RoomRepository::get_or_create(&pool, "a", "b").await.unwrap();
        assert!(MessageRepository::create(&pool, room.id, "a", "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_room_cascades() {
        let pool = setup_test_db().await;
        let (room, _) = RoomRepository::get_or_create(&pool, "a", "b").await.unwrap();
        MessageRepository::create(&pool, room.id, "a", "bye").await.unwrap();

        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(MessageRepository::list_for_room(&pool, room.id).await.unwrap().is_empty());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A two-party conversation.
///
/// `participant_a < participant_b` always holds; see [`Room::normalize_pair`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: i64,
    pub participant_a: String,
    pub participant_b: String,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Order a participant pair the way it is stored.
    pub fn normalize_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }
}

/// A persisted chat message.
///
/// Serializes as `{id, room, sender_id, content, timestamp, is_read}`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "room")]
    pub room_id: i64,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pair_sorts_lexicographically() {
        assert_eq!(Room::normalize_pair("5", "3"), ("3", "5"));
        assert_eq!(Room::normalize_pair("3", "5"), ("3", "5"));
        // Lexicographic, not numeric
        assert_eq!(Room::normalize_pair("10", "9"), ("10", "9"));
    }

    #[test]
    fn test_has_participant() {
        let room = Room {
            id: 1,
            participant_a: "alice".into(),
            participant_b: "bob".into(),
            created_at: Utc::now(),
        };
        assert!(room.has_participant("alice"));
        assert!(room.has_participant("bob"));
        assert!(!room.has_participant("carol"));
    }
}

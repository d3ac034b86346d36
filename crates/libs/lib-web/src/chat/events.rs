//! # Chat Events
//!
//! Wire types for the chat sockets and the broadcast bus.
//!
//! - [`InboundEvent`]: frames sent by clients.
//! - [`GroupEvent`]: what gets published to a broadcast group. Serialized as
//!   JSON when it crosses process boundaries.
//! - [`OutboundEvent`]: frames written to clients.
//!
//! ## Outbound Wire Format
//!
//! ```text
//! {"id":1,"room":7,"sender_id":"3","content":"hi","timestamp":"2025-01-01T00:00:00.000Z"}
//! {"type":"typing","user_id":"3","is_typing":true}
//! {"type":"presence","user_id":"3","status":"online"}
//! {"type":"presence_global","user_id":"3","status":"away"}
//! {"type":"profile","profile":{...}}
//! {"type":"error","detail":"unknown type"}
//! ```

use chrono::{DateTime, Utc};
use lib_core::model::store::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// region: --- Inbound

/// A client frame, dispatched on its `type` field.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message {
        #[serde(default)]
        content: String,
    },
    Typing {
        #[serde(default)]
        is_typing: Value,
    },
    FetchProfile,
    #[serde(other)]
    Unrecognized,
}

/// Reason a frame could not be turned into an [`InboundEvent`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid json")]
    InvalidJson,
    #[error("expected a json object")]
    NotAnObject,
    #[error("unknown type")]
    UnknownType,
    #[error("invalid {event} event: {reason}")]
    InvalidFields { event: String, reason: String },
}

impl InboundEvent {
    /// Parse a text frame.
    ///
    /// A missing or non-string `type` and an unrecognized `type` both yield
    /// [`FrameError::UnknownType`].
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(|_| FrameError::InvalidJson)?;
        let Some(object) = value.as_object() else {
            return Err(FrameError::NotAnObject);
        };
        let Some(event) = object.get("type").and_then(Value::as_str).map(str::to_string) else {
            return Err(FrameError::UnknownType);
        };

        match serde_json::from_value(value) {
            Ok(InboundEvent::Unrecognized) => Err(FrameError::UnknownType),
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(FrameError::InvalidFields { event, reason: e.to_string() }),
        }
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// endregion: --- Inbound

// region: --- Group

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A persisted message as broadcast to a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: i64,
    pub room: i64,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessagePayload {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            room: msg.room_id,
            sender_id: msg.sender_id,
            content: msg.content,
            timestamp: msg.timestamp,
        }
    }
}

/// An event published to a broadcast group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GroupEvent {
    #[serde(rename = "chat.message")]
    ChatMessage { message: MessagePayload },
    #[serde(rename = "typing.event")]
    Typing { user_id: String, is_typing: bool },
    #[serde(rename = "presence.update")]
    Presence { user_id: String, status: PresenceStatus },
    #[serde(rename = "presence.broadcast")]
    PresenceBroadcast { user_id: String, status: String },
}

// endregion: --- Group

// region: --- Outbound

/// Frames that carry a `type` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Typing { user_id: String, is_typing: bool },
    Presence { user_id: String, status: PresenceStatus },
    PresenceGlobal { user_id: String, status: String },
    Profile { profile: Option<Value> },
    Error { detail: String },
}

/// A frame written to a client socket.
///
/// Chat messages go out bare, without a `type` field.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OutboundEvent {
    Message(MessagePayload),
    Server(ServerEvent),
}

impl OutboundEvent {
    pub fn error(detail: impl Into<String>) -> Self {
        OutboundEvent::Server(ServerEvent::Error { detail: detail.into() })
    }

    pub fn profile(profile: Option<Value>) -> Self {
        OutboundEvent::Server(ServerEvent::Profile { profile })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<GroupEvent> for OutboundEvent {
    fn from(event: GroupEvent) -> Self {
        match event {
            GroupEvent::ChatMessage { message } => OutboundEvent::Message(message),
            GroupEvent::Typing { user_id, is_typing } => {
                OutboundEvent::Server(ServerEvent::Typing { user_id, is_typing })
            }
            GroupEvent::Presence { user_id, status } => {
                OutboundEvent::Server(ServerEvent::Presence { user_id, status })
            }
            GroupEvent::PresenceBroadcast { user_id, status } => {
                OutboundEvent::Server(ServerEvent::PresenceGlobal { user_id, status })
            }
        }
    }
}

// endregion: --- Outbound

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_events() {
        assert_eq!(
            InboundEvent::parse(r#"{"type":"message","content":"  hi "}"#),
            Ok(InboundEvent::Message { content: "  hi ".into() })
        );
        assert_eq!(
            InboundEvent::parse(r#"{"type":"typing","is_typing":1}"#),
            Ok(InboundEvent::Typing { is_typing: json!(1) })
        );
        assert_eq!(
            InboundEvent::parse(r#"{"type":"typing"}"#),
            Ok(InboundEvent::Typing { is_typing: Value::Null })
        );
        assert_eq!(
            InboundEvent::parse(r#"{"type":"fetch_profile"}"#),
            Ok(InboundEvent::FetchProfile)
        );
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert_eq!(InboundEvent::parse("not json"), Err(FrameError::InvalidJson));
        assert_eq!(InboundEvent::parse("[1,2]"), Err(FrameError::NotAnObject));
        assert_eq!(InboundEvent::parse(r#"{"content":"x"}"#), Err(FrameError::UnknownType));
        assert_eq!(InboundEvent::parse(r#"{"type":"dance"}"#), Err(FrameError::UnknownType));
        assert!(matches!(
            InboundEvent::parse(r#"{"type":"message","content":5}"#),
            Err(FrameError::InvalidFields { .. })
        ));
        assert_eq!(FrameError::UnknownType.to_string(), "unknown type");
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!(-2.5), json!("no"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_outbound_shapes() {
        let msg = MessagePayload {
            id: 1,
            room: 7,
            sender_id: "3".into(),
            content: "hi".into(),
            timestamp: Utc::now(),
        };
        let value: Value = serde_json::from_str(
            &OutboundEvent::from(GroupEvent::ChatMessage { message: msg }).to_json().unwrap(),
        )
        .unwrap();
        assert!(value.get("type").is_none());
        assert_eq!(value["room"], 7);

        let presence = OutboundEvent::from(GroupEvent::Presence {
            user_id: "3".into(),
            status: PresenceStatus::Offline,
        });
        assert_eq!(
            serde_json::to_value(&presence).unwrap(),
            json!({"type": "presence", "user_id": "3", "status": "offline"})
        );

        let global = OutboundEvent::from(GroupEvent::PresenceBroadcast {
            user_id: "3".into(),
            status: "away".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&global).unwrap(),
            json!({"type": "presence_global", "user_id": "3", "status": "away"})
        );

        assert_eq!(
            serde_json::to_value(OutboundEvent::profile(None)).unwrap(),
            json!({"type": "profile", "profile": null})
        );
    }

    #[test]
    fn test_group_event_survives_the_wire() {
        let event = GroupEvent::Typing { user_id: "9".into(), is_typing: true };
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains(r#""type":"typing.event""#));
        assert_eq!(serde_json::from_str::<GroupEvent>(&text).unwrap(), event);
    }
}

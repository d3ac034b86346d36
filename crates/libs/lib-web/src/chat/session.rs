//! # Chat Sessions
//!
//! One session per upgraded socket. A session owns two queues:
//!
//! - the **group queue**, whose sending half is joined to the broadcast bus;
//! - the **reply queue**, for events addressed to this connection only
//!   (profiles, errors).
//!
//! A writer task drains both queues into the socket sink while the reader task
//! dispatches client frames. When either side ends, the other is aborted and
//! the session leaves its group before announcing anything else.

use super::bus::{room_group, BroadcastBus, PRESENCE_GROUP};
use super::events::{is_truthy, GroupEvent, InboundEvent, OutboundEvent, PresenceStatus};
use super::state::ChatAppState;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use lib_auth::AuthenticatedIdentity;
use lib_core::model::store::MessageRepository;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// region: --- Writer

/// Drain the group and reply queues into the socket until both close or a write fails.
fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut group_rx: mpsc::Receiver<GroupEvent>,
    mut reply_rx: mpsc::Receiver<OutboundEvent>,
    conn_id: Uuid,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut sent = 0u64;
        loop {
            let outbound = tokio::select! {
                Some(event) = group_rx.recv() => OutboundEvent::from(event),
                Some(event) = reply_rx.recv() => event,
                else => break,
            };

            let json = match outbound.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(conn_id = %conn_id, error = %e, "[WS] SERIALIZE_ERROR conn_id={}", conn_id);
                    continue;
                }
            };

            if let Err(e) = sink.send(Message::Text(json.into())).await {
                debug!(conn_id = %conn_id, error = %e, "[WS] SEND_ERROR conn_id={} error={}", conn_id, e);
                break;
            }
            sent += 1;
        }
        let _ = sink.close().await;
        sent
    })
}

/// Wait for the first of reader/writer to finish and abort the other.
async fn await_either(mut reader: JoinHandle<()>, mut writer: JoinHandle<u64>, conn_id: Uuid) {
    tokio::select! {
        result = &mut writer => {
            reader.abort();
            if let Err(e) = result {
                error!(conn_id = %conn_id, error = ?e, "[WS] SEND_TASK_ERROR conn_id={} error={:?}", conn_id, e);
            }
        }
        result = &mut reader => {
            writer.abort();
            if let Err(e) = result {
                error!(conn_id = %conn_id, error = ?e, "[WS] RECV_TASK_ERROR conn_id={} error={:?}", conn_id, e);
            }
        }
    }
}

// endregion: --- Writer

// region: --- RoomSession

/// A participant connected to one room.
#[derive(Clone)]
pub struct RoomSession {
    id: Uuid,
    room_id: i64,
    group: String,
    identity: Arc<AuthenticatedIdentity>,
    state: Arc<ChatAppState>,
}

impl RoomSession {
    pub fn new(room_id: i64, identity: AuthenticatedIdentity, state: Arc<ChatAppState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            group: room_group(room_id),
            identity: Arc::new(identity),
            state,
        }
    }

    /// Drive the socket until the client goes away.
    pub async fn run(self, socket: WebSocket) {
        let started = Instant::now();
        let (sink, mut stream) = socket.split();
        let (group_tx, group_rx) = mpsc::channel(self.state.session_buffer);
        let (reply_tx, reply_rx) = mpsc::channel(self.state.session_buffer);

        self.state.bus.join(&self.group, self.id, group_tx).await;
        info!(
            conn_id = %self.id,
            room_id = self.room_id,
            user_id = %self.identity.user_id,
            "[WS] CONNECTED conn_id={} room={} user={}",
            self.id,
            self.room_id,
            self.identity.user_id
        );
        self.publish_presence(PresenceStatus::Online).await;

        let writer = spawn_writer(sink, group_rx, reply_rx, self.id);

        let session = self.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => session.handle_frame(text.as_str(), &reply_tx).await,
                    Ok(Message::Binary(_)) => {
                        let _ = reply_tx.send(OutboundEvent::error("binary frames are not supported")).await;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(conn_id = %session.id, error = %e, "[WS] RECV_ERROR");
                        break;
                    }
                }
            }
        });

        await_either(reader, writer, self.id).await;

        self.state.bus.leave(&self.group, self.id).await;
        self.publish_presence(PresenceStatus::Offline).await;

        info!(
            conn_id = %self.id,
            room_id = self.room_id,
            user_id = %self.identity.user_id,
            duration_ms = started.elapsed().as_millis(),
            "[WS] DISCONNECTED conn_id={} room={} user={}",
            self.id,
            self.room_id,
            self.identity.user_id
        );
    }

    async fn handle_frame(&self, text: &str, reply: &mpsc::Sender<OutboundEvent>) {
        match InboundEvent::parse(text) {
            Ok(InboundEvent::Message { content }) => self.handle_message(&content, reply).await,
            Ok(InboundEvent::Typing { is_typing }) => self.handle_typing(&is_typing).await,
            Ok(InboundEvent::FetchProfile) => self.handle_fetch_profile(reply),
            Ok(InboundEvent::Unrecognized) => {
                let _ = reply.send(OutboundEvent::error("unknown type")).await;
            }
            Err(e) => {
                debug!(conn_id = %self.id, error = %e, "[WS] Bad frame");
                let _ = reply.send(OutboundEvent::error(e.to_string())).await;
            }
        }
    }

    async fn handle_message(&self, content: &str, reply: &mpsc::Sender<OutboundEvent>) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }

        let message = match MessageRepository::create(
            &self.state.db,
            self.room_id,
            &self.identity.user_id,
            content,
        )
        .await
        {
            Ok(message) => message,
            Err(e) => {
                error!(
                    conn_id = %self.id,
                    room_id = self.room_id,
                    error = %e,
                    "[WS] STORE_ERROR room={} error={}",
                    self.room_id,
                    e
                );
                let _ = reply.send(OutboundEvent::error("message could not be saved")).await;
                return;
            }
        };

        debug!(conn_id = %self.id, message_id = message.id, "[WS] Message stored");
        self.publish(GroupEvent::ChatMessage { message: message.into() }).await;
    }

    async fn handle_typing(&self, is_typing: &Value) {
        self.publish(GroupEvent::Typing {
            user_id: self.identity.user_id.clone(),
            is_typing: is_truthy(is_typing),
        })
        .await;
    }

    /// Profile lookups can take seconds, so they run off the reader task.
    fn handle_fetch_profile(&self, reply: &mpsc::Sender<OutboundEvent>) {
        let identity = Arc::clone(&self.state.identity);
        let token = self.identity.token.clone();
        let reply = reply.clone();
        tokio::spawn(async move {
            let profile = identity.fetch_profile(&token).await;
            let _ = reply.send(OutboundEvent::profile(profile)).await;
        });
    }

    async fn publish_presence(&self, status: PresenceStatus) {
        self.publish(GroupEvent::Presence {
            user_id: self.identity.user_id.clone(),
            status,
        })
        .await;
    }

    async fn publish(&self, event: GroupEvent) {
        if let Err(e) = self.state.bus.publish(&self.group, event).await {
            warn!(conn_id = %self.id, group = %self.group, error = %e, "[WS] PUBLISH_ERROR");
        }
    }
}

// endregion: --- RoomSession

// region: --- PresenceSession

/// A connection to the global presence group.
///
/// Relays `{"action":"status","status":"..."}` announcements with a non-empty
/// string status, stamped with the verified user id. Every other frame is ignored.
pub struct PresenceSession {
    id: Uuid,
    user_id: String,
    bus: Arc<dyn BroadcastBus>,
    buffer: usize,
}

impl PresenceSession {
    pub fn new(identity: AuthenticatedIdentity, state: &ChatAppState) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: identity.user_id,
            bus: Arc::clone(&state.bus),
            buffer: state.session_buffer,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let (sink, mut stream) = socket.split();
        let (group_tx, group_rx) = mpsc::channel(self.buffer);
        // Nothing is ever addressed to a presence connection alone
        let (_reply_tx, reply_rx) = mpsc::channel(1);

        self.bus.join(PRESENCE_GROUP, self.id, group_tx).await;
        info!(conn_id = %self.id, user_id = %self.user_id, "[WS] PRESENCE_CONNECTED user={}", self.user_id);

        let writer = spawn_writer(sink, group_rx, reply_rx, self.id);

        let bus = Arc::clone(&self.bus);
        let user_id = self.user_id.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    Message::Text(text) => {
                        if let Some(status) = status_announcement(text.as_str()) {
                            let event = GroupEvent::PresenceBroadcast { user_id: user_id.clone(), status };
                            if let Err(e) = bus.publish(PRESENCE_GROUP, event).await {
                                warn!(user_id = %user_id, error = %e, "[WS] PUBLISH_ERROR");
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        await_either(reader, writer, self.id).await;

        self.bus.leave(PRESENCE_GROUP, self.id).await;
        info!(conn_id = %self.id, user_id = %self.user_id, "[WS] PRESENCE_DISCONNECTED user={}", self.user_id);
    }
}

/// The `status` of a `{"action":"status"}` frame, if it is a non-empty string.
fn status_announcement(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    if object.get("action").and_then(Value::as_str) != Some("status") {
        return None;
    }
    object
        .get("status")
        .and_then(Value::as_str)
        .filter(|status| !status.is_empty())
        .map(str::to_string)
}

// endregion: --- PresenceSession

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_announcement() {
        assert_eq!(
            status_announcement(r#"{"action":"status","status":"away"}"#),
            Some("away".to_string())
        );
        assert_eq!(status_announcement(r#"{"action":"status"}"#), None);
        assert_eq!(status_announcement(r#"{"action":"status","status":null}"#), None);
        assert_eq!(status_announcement(r#"{"action":"status","status":5}"#), None);
        assert_eq!(status_announcement(r#"{"action":"status","status":""}"#), None);
        assert_eq!(status_announcement(r#"{"action":"wave"}"#), None);
        assert_eq!(status_announcement("garbage"), None);
        assert_eq!(status_announcement("[]"), None);
    }
}

//! # Room Socket Handler
//!
//! **Route**: `GET /ws/chat/{room_id}`
//!
//! Handshake order: credential (401), then room membership (403), then the
//! upgrade itself. No membership lookup happens for an unauthenticated request.
//!
//! ```javascript
//! const ws = new WebSocket(`ws://localhost:8000/ws/chat/${roomId}?token=${jwt}`);
//! ws.send(JSON.stringify({ type: "message", content: "hi" }));
//! ```

use super::utils::{authenticate_handshake, authorize_room, HandshakeQuery};
use crate::chat::session::RoomSession;
use crate::chat::state::ChatAppState;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use lib_core::AppError;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn room_socket(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Path(room_id): Path<String>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<ChatAppState>>,
) -> Response {
    let identity = match authenticate_handshake(&state.verifier, &query, &headers) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(room_id = %room_id, reason = %e, "[WS] Rejected: {}", e);
            return AppError::Unauthorized(e.to_string()).into_response();
        }
    };

    let room_id = match authorize_room(&state.db, &room_id, &identity.user_id).await {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(
        room_id = room_id,
        user_id = %identity.user_id,
        "[WS] UPGRADE_START room={} user={}",
        room_id,
        identity.user_id
    );

    let session = RoomSession::new(room_id, identity, state);
    ws.on_upgrade(move |socket| session.run(socket))
}

//! # Presence Socket Handler
//!
//! **Route**: `GET /ws/presence`
//!
//! Authenticated like the room socket. Clients announce
//! `{"action":"status","status":"away"}` and every presence connection
//! receives `{"type":"presence_global","user_id":"3","status":"away"}`.

use super::utils::{authenticate_handshake, HandshakeQuery};
use crate::chat::session::PresenceSession;
use crate::chat::state::ChatAppState;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use lib_core::AppError;
use std::sync::Arc;
use tracing::warn;

pub async fn presence_socket(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<ChatAppState>>,
) -> Response {
    let identity = match authenticate_handshake(&state.verifier, &query, &headers) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(reason = %e, "[WS] Presence rejected: {}", e);
            return AppError::Unauthorized(e.to_string()).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let session = PresenceSession::new(identity, &state);
    ws.on_upgrade(move |socket| session.run(socket))
}

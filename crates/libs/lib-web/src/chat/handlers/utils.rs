//! # Chat Handler Utilities
//!
//! Shared helper functions for chat handlers.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use lib_auth::{extract_token, AuthFailure, AuthenticatedIdentity, TokenVerifier};
use lib_core::{model::store::RoomRepository, AppError, DbPool};
use serde::Deserialize;
use tracing::warn;

/// Query string of a socket handshake.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// Verify the handshake credential (`?token=` first, then `Authorization: Bearer`).
pub fn authenticate_handshake(
    verifier: &TokenVerifier,
    query: &HandshakeQuery,
    headers: &HeaderMap,
) -> Result<AuthenticatedIdentity, AuthFailure> {
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let token = extract_token(query.token.as_deref(), authorization)?;
    verifier.verify(&token)
}

/// Check that `room_id` names an existing room that `user_id` belongs to.
///
/// Unparseable ids are treated as unknown rooms. Unknown rooms and
/// non-participants get the same `Forbidden`.
pub async fn authorize_room(pool: &DbPool, room_id: &str, user_id: &str) -> Result<i64, AppError> {
    let Ok(id) = room_id.parse::<i64>() else {
        warn!(room_id = %room_id, user_id = %user_id, "[WS] Rejected: malformed room id");
        return Err(AppError::Forbidden("Room not accessible".to_string()));
    };

    match RoomRepository::find_by_id(pool, id).await? {
        Some(room) if room.has_participant(user_id) => Ok(id),
        Some(_) => {
            warn!(room_id = id, user_id = %user_id, "[WS] Rejected: not a participant");
            Err(AppError::Forbidden("Room not accessible".to_string()))
        }
        None => {
            warn!(room_id = id, user_id = %user_id, "[WS] Rejected: room does not exist");
            Err(AppError::Forbidden("Room not accessible".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use lib_auth::encode_jwt;

    const SECRET: &str = "test-secret-key-must-be-at-least-32-characters-long!";

    #[test]
    fn test_authenticate_from_query_or_header() {
        let verifier = TokenVerifier::hmac(SECRET).unwrap();
        let token = encode_jwt("3", "alice", SECRET, 1).unwrap();

        let query = HandshakeQuery { token: Some(token.clone()) };
        let identity = authenticate_handshake(&verifier, &query, &HeaderMap::new()).unwrap();
        assert_eq!(identity.user_id, "3");

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let identity =
            authenticate_handshake(&verifier, &HandshakeQuery::default(), &headers).unwrap();
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn test_authenticate_without_token() {
        let verifier = TokenVerifier::hmac(SECRET).unwrap();
        assert_eq!(
            authenticate_handshake(&verifier, &HandshakeQuery::default(), &HeaderMap::new())
                .unwrap_err(),
            AuthFailure::MissingToken
        );
    }
}

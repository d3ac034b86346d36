//! # Room Handlers
//!
//! ## Endpoints
//!
//! - `POST /api/chat/rooms` - Get or create the room of two users
//! - `GET /api/chat/rooms/{id}/messages` - Message history, oldest first
//!
//! ## Room Creation Checks
//!
//! Evaluated in order, the first failure wins:
//!
//! 1. Bearer token (401, enforced by middleware)
//! 2. Both participants present, non-empty, URL-safe and distinct (400)
//! 3. Caller is one of the participants (403)
//! 4. Identity service reports a participant as missing (404)
//! 5. Identity service gave no answer and fail-open is disabled (503)


use crate::services::{IdentityGateway, UserCheck};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use lib_auth::AuthenticatedIdentity;
use lib_core::dto::{CreateRoomRequest, MessageResponse, RoomResponse};
use lib_core::model::store::{MessageRepository, RoomRepository};
use lib_core::{AppError, Config, DbPool};
use lib_utils::{validate_distinct, validate_identifier};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Get or create the room for two participants.
///
/// Returns 201 when this call created the room and 200 when it already existed.
#[instrument(skip_all, fields(caller = %identity.user_id))]
pub async fn create_room(
    State(db): State<DbPool>,
    State(config): State<Config>,
    State(identity_gateway): State<Arc<dyn IdentityGateway>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let (participant_a, participant_b) = payload.normalized().ok_or_else(|| {
        AppError::InvalidInput("participant_a and participant_b are required".to_string())
    })?;
    validate_identifier(&participant_a, "participant_a").map_err(AppError::InvalidInput)?;
    validate_identifier(&participant_b, "participant_b").map_err(AppError::InvalidInput)?;
    validate_distinct(&participant_a, &participant_b, "participant_a", "participant_b")
        .map_err(AppError::InvalidInput)?;

    if identity.user_id != participant_a && identity.user_id != participant_b {
        warn!("[ROOMS] Caller {} is not a participant", identity.user_id);
        return Err(AppError::Forbidden(
            "You can only create rooms you participate in".to_string(),
        ));
    }

    let (check_a, check_b) = tokio::join!(
        identity_gateway.check_user(&participant_a, &identity.token),
        identity_gateway.check_user(&participant_b, &identity.token),
    );

    for (participant, check) in [(&participant_a, check_a), (&participant_b, check_b)] {
        match check {
            UserCheck::Exists => {}
            UserCheck::Missing => {
                return Err(AppError::NotFound(format!("User {} does not exist", participant)));
            }
            UserCheck::Unknown if config.identity_fail_open => {
                warn!("[ROOMS] Existence of user {} unknown, proceeding (fail-open)", participant);
            }
            UserCheck::Unknown => {
                return Err(AppError::Upstream(format!(
                    "Could not verify user {}",
                    participant
                )));
            }
        }
    }

    let (room, created) = RoomRepository::get_or_create(&db, &participant_a, &participant_b).await?;
    info!(room_id = room.id, created, "[ROOMS] Room {} ready", room.id);

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(room.into())))
}

/// List a room's messages, oldest first. Only participants may read them.
#[instrument(skip_all, fields(room_id = room_id, caller = %identity.user_id))]
pub async fn list_messages(
    State(db): State<DbPool>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let room = RoomRepository::find_by_id(&db, room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

    if !room.has_participant(&identity.user_id) {
        return Err(AppError::Forbidden("Not a participant of this room".to_string()));
    }

    let messages = MessageRepository::list_for_room(&db, room_id).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

//! # HTTP Request Handlers
//!
//! Plain request/response endpoints. The WebSocket upgrade handlers live in
//! [`crate::chat::handlers`].
//!
//! ## Handler Modules
//!
//! - **[`rooms`]**: Room creation and message history
//!   - `POST /api/chat/rooms` - Get or create the room of two users
//!   - `GET /api/chat/rooms/{id}/messages` - Message history of a room
//!
//! ## Handler Architecture
//!
//! Routes under `/api/chat` sit behind [`crate::middleware::require_auth`],
//! which injects the caller's identity:
//!
//! ```rust,ignore
//! async fn handler(
//!     State(db): State<DbPool>,
//!     Extension(identity): Extension<AuthenticatedIdentity>,
//!     Json(payload): Json<RequestBody>,
//! ) -> Result<Json<Response>, AppError> {
//!     Ok(Json(response))
//! }
//! ```

pub mod rooms;

//! # Authentication Middleware
//!
//! Validates the `Authorization: Bearer <token>` header and injects the
//! caller's [`AuthenticatedIdentity`] into the request extensions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::{middleware, routing::get, Router};
//! use lib_web::middleware::require_auth;
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .layer(middleware::from_fn_with_state(verifier, require_auth));
//! ```
//!
//! Handlers then extract the identity:
//!
//! ```rust,ignore
//! use axum::extract::Extension;
//! use lib_auth::AuthenticatedIdentity;
//!
//! async fn protected_handler(Extension(identity): Extension<AuthenticatedIdentity>) -> String {
//!     format!("Hello, user {}!", identity.user_id)
//! }
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use lib_auth::{extract_token, TokenVerifier};
use lib_core::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authentication middleware for the REST surface.
///
/// Only the header is consulted here; the `?token=` query fallback is reserved
/// for socket handshakes.
///
/// - **Valid token**: continues with `AuthenticatedIdentity` in extensions
/// - **Missing/invalid/expired token**: `401 Unauthorized`
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let identity = extract_token(None, authorization)
        .and_then(|token| verifier.verify(&token))
        .map_err(|e| {
            warn!("[AUTH] Rejected {}: {}", req.uri().path(), e);
            AppError::Unauthorized(e.to_string())
        })?;

    debug!("[AUTH] Authenticated user: {} (id: {})", identity.username, identity.user_id);

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

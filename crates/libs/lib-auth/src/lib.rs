//! # Authentication Library
//!
//! Bearer token verification and identity extraction. Tokens are issued by the
//! external identity service; this crate only verifies them.

pub mod token;

// Re-export commonly used types
pub use token::{
    encode_jwt, extract_token, AuthFailure, AuthenticatedIdentity, ClaimId, Claims, KeyConfigError,
    TokenVerifier,
};

//! # Token Verification
//!
//! Bearer token validation and identity extraction.
//!
//! Exactly one key scheme is active per deployment: an HMAC shared secret
//! (`HS256`/`HS384`/`HS512`) or an RSA public key (`RS256`/`RS384`/`RS512`).
//! Verification never panics and never surfaces as a server error; every
//! decode, signature, or expiry problem becomes an [`AuthFailure`].

// region: --- Modules
mod claims;
mod extract;
// endregion: --- Modules

// region: --- Re-exports
pub use claims::{ClaimId, Claims};
pub use extract::extract_token;
// endregion: --- Re-exports

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Why a credential was not accepted.
///
/// Callers treat every variant as "unauthenticated", never as a system error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthFailure {
    #[error("no token supplied")]
    MissingToken,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("malformed claims: {0}")]
    MalformedClaims(String),

    #[error("token carries neither user_id nor sub")]
    MissingSubject,
}

/// Verifier construction errors. These are deployment mistakes, raised at startup.
#[derive(Debug, Error)]
pub enum KeyConfigError {
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("JWT_SECRET is required for {0:?}")]
    MissingSecret(Algorithm),

    #[error("JWT_PUBLIC_KEY is required for {0:?}")]
    MissingPublicKey(Algorithm),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Identity resolved from a verified token. Lives as long as the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    /// Best-effort display name, may be empty.
    pub username: String,
    /// Full decoded payload.
    pub claims: Value,
    /// The raw token, kept for forwarding to the identity service.
    pub token: String,
}

/// Validates bearer tokens with the configured algorithm and key.
#[derive(Clone)]
pub struct TokenVerifier {
    algorithm: Algorithm,
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier from the configured algorithm name and key material.
    ///
    /// HMAC algorithms read `secret`, RSA algorithms read `public_key_pem`.
    /// The other value is ignored.
    pub fn new(
        algorithm: &str,
        secret: Option<&str>,
        public_key_pem: Option<&str>,
    ) -> Result<Self, KeyConfigError> {
        let algorithm: Algorithm = algorithm
            .trim()
            .to_uppercase()
            .parse()
            .map_err(|_| KeyConfigError::UnsupportedAlgorithm(algorithm.to_string()))?;

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = secret
                    .filter(|s| !s.is_empty())
                    .ok_or(KeyConfigError::MissingSecret(algorithm))?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                let pem = public_key_pem
                    .filter(|s| !s.is_empty())
                    .ok_or(KeyConfigError::MissingPublicKey(algorithm))?;
                // Env files often carry the PEM on one line with literal "\n"
                let pem = pem.replace("\\n", "\n");
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| KeyConfigError::InvalidPublicKey(e.to_string()))?
            }
            other => return Err(KeyConfigError::UnsupportedAlgorithm(format!("{other:?}"))),
        };

        Ok(Self {
            algorithm,
            key,
            validation: Validation::new(algorithm),
        })
    }

    /// Shorthand for an `HS256` verifier.
    pub fn hmac(secret: &str) -> Result<Self, KeyConfigError> {
        Self::new("HS256", Some(secret), None)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Verify `token` and resolve the identity it carries.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AuthFailure> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthFailure::MissingToken);
        }

        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            debug!("[AUTH] Token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::InvalidToken(e.to_string()),
            }
        })?;

        let raw = data.claims;
        let claims: Claims = serde_json::from_value(raw.clone())
            .map_err(|e| AuthFailure::MalformedClaims(e.to_string()))?;

        let user_id = claims.subject().ok_or(AuthFailure::MissingSubject)?;
        let username = claims.display_name();

        debug!("[AUTH] Verified token for user {} ({})", user_id, username);

        Ok(AuthenticatedIdentity {
            user_id,
            username,
            claims: raw,
            token: token.to_string(),
        })
    }
}

/// Encode an `HS256` token for `user_id`.
///
/// Token issuance belongs to the identity service; this exists for tests and
/// local tooling.
pub fn encode_jwt(
    user_id: &str,
    username: &str,
    secret: &str,
    expiration_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        user_id: Some(ClaimId::Text(user_id.to_string())),
        sub: None,
        username: Some(username.to_string()),
        email: None,
        exp: exp.timestamp(),
        iat: Some(now.timestamp()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

//! # Application Configuration
//!
//! This module manages application configuration loaded from environment variables.
//! All configuration is validated on startup to fail fast if misconfigured.
//!
//! ## Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite:data/chat.db` |
//! | `JWT_ALGORITHM` | `HS256` |
//! | `JWT_SECRET` | required for HMAC algorithms |
//! | `JWT_PUBLIC_KEY` | required for RSA algorithms |
//! | `AUTH_API_URL` | `http://authservice:8080` |
//! | `AUTH_PROFILE_ENDPOINT` | `api/users/profile/` |
//! | `IDENTITY_TIMEOUT_SECS` | `10` |
//! | `IDENTITY_FAIL_OPEN` | `true` |
//! | `BROADCAST_BACKEND` | `local` |
//! | `REDIS_URL` | `redis://127.0.0.1:6379` |
//! | `SESSION_BUFFER` | `64` |

use lib_utils::{get_env_opt, get_env_or, get_env_parse_or};
use std::str::FromStr;
use tracing::warn;

/// Which broadcast bus fans events out to sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusBackend {
    /// Process-local registry. Sessions must all live in this process.
    Local,
    /// Redis pub/sub, for sessions spread over several processes.
    Redis,
}

impl FromStr for BusBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "memory" => Ok(BusBackend::Local),
            "redis" => Ok(BusBackend::Redis),
            other => Err(format!("Invalid broadcast backend: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database connection URL
    pub database_url: String,

    /// Token signing algorithm name (`HS256`, `RS256`, ...)
    pub jwt_algorithm: String,

    /// Shared secret for HMAC algorithms
    pub jwt_secret: Option<String>,

    /// PEM-encoded public key for RSA algorithms
    pub jwt_public_key: Option<String>,

    /// Base URL of the identity service
    pub auth_api_url: String,

    /// Profile path on the identity service, relative to `auth_api_url`
    pub auth_profile_endpoint: String,

    /// Per-request timeout for identity service calls, in seconds
    ///
    /// Valid range: 1-60
    pub identity_timeout_secs: u64,

    /// Let room creation proceed when the identity service cannot answer.
    ///
    /// A definite "user not found" always denies.
    pub identity_fail_open: bool,

    pub broadcast_backend: BusBackend,

    pub redis_url: String,

    /// Capacity of each session's outbound queue
    pub session_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = get_env_or("DATABASE_URL", "sqlite:data/chat.db");
        let jwt_algorithm = get_env_or("JWT_ALGORITHM", "HS256").to_uppercase();
        let jwt_secret = get_env_opt("JWT_SECRET");
        let jwt_public_key = get_env_opt("JWT_PUBLIC_KEY");

        let auth_api_url = get_env_or("AUTH_API_URL", "http://authservice:8080");
        let auth_profile_endpoint = get_env_or("AUTH_PROFILE_ENDPOINT", "api/users/profile/");

        let identity_timeout_secs =
            get_env_parse_or("IDENTITY_TIMEOUT_SECS", 10).map_err(|e| e.to_string())?;
        let identity_fail_open =
            get_env_parse_or("IDENTITY_FAIL_OPEN", true).map_err(|e| e.to_string())?;

        let broadcast_backend = get_env_or("BROADCAST_BACKEND", "local").parse()?;
        let redis_url = get_env_or("REDIS_URL", "redis://127.0.0.1:6379");

        let session_buffer = get_env_parse_or("SESSION_BUFFER", 64).map_err(|e| e.to_string())?;

        Ok(Self {
            database_url,
            jwt_algorithm,
            jwt_secret,
            jwt_public_key,
            auth_api_url,
            auth_profile_endpoint,
            identity_timeout_secs,
            identity_fail_open,
            broadcast_backend,
            redis_url,
            session_buffer,
        })
    }

    /// Validate configuration values against security and deployment rules.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_algorithm.starts_with("RS") {
            if self.jwt_public_key.is_none() {
                return Err(format!("JWT_PUBLIC_KEY must be set for {}", self.jwt_algorithm));
            }
        } else {
            match &self.jwt_secret {
                None => return Err(format!("JWT_SECRET must be set for {}", self.jwt_algorithm)),
                Some(secret) if secret.len() < 32 => {
                    warn!("JWT_SECRET is shorter than 32 characters");
                }
                Some(_) => {}
            }
        }

        if self.identity_timeout_secs < 1 || self.identity_timeout_secs > 60 {
            return Err("IDENTITY_TIMEOUT_SECS must be between 1 and 60".to_string());
        }

        if self.session_buffer == 0 {
            return Err("SESSION_BUFFER must be at least 1".to_string());
        }

        if !self.auth_api_url.starts_with("http://") && !self.auth_api_url.starts_with("https://") {
            return Err("AUTH_API_URL must be an http(s) URL".to_string());
        }

        Ok(())
    }
}

//! # Identity Service Client
//!
//! Profile lookup and user existence checks against the external identity
//! service. Calls forward the caller's bearer token.
//!
//! ## Endpoints
//!
//! - `GET {AUTH_API_URL}/{AUTH_PROFILE_ENDPOINT}` - profile of the token's owner
//! - `GET {AUTH_API_URL}/api/users/{id}/` - 200 if the user exists, 404 if not
//!
//! None of these calls fail: an unreachable or misbehaving identity service
//! degrades to `None` / [`UserCheck::Unknown`] and is logged.

use async_trait::async_trait;
use lib_core::Config;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a user existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCheck {
    /// The identity service confirmed the user (200).
    Exists,
    /// The identity service says there is no such user (404).
    Missing,
    /// No definite answer: timeout, connection error, 401, 5xx, ...
    Unknown,
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Profile of the token's owner, or `None` on any failure.
    async fn fetch_profile(&self, token: &str) -> Option<Value>;

    async fn check_user(&self, user_id: &str, token: &str) -> UserCheck;

    async fn verify_user_exists(&self, user_id: &str, token: &str) -> bool {
        self.check_user(user_id, token).await == UserCheck::Exists
    }
}

/// [`IdentityGateway`] over HTTP.
#[derive(Clone)]
pub struct HttpIdentityGateway {
    client: reqwest::Client,
    base_url: String,
    profile_endpoint: String,
}

impl HttpIdentityGateway {
    pub fn new(
        base_url: &str,
        profile_endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile_endpoint: profile_endpoint.trim_start_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.auth_api_url,
            &config.auth_profile_endpoint,
            Duration::from_secs(config.identity_timeout_secs),
        )
    }

    fn profile_url(&self) -> String {
        format!("{}/{}", self.base_url, self.profile_endpoint)
    }

    /// `{base}/api/users/{id}/` with the id percent-encoded as a single segment.
    fn user_url(&self, user_id: &str) -> Option<Url> {
        if user_id.is_empty() || user_id == "." || user_id == ".." {
            return None;
        }
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["api", "users", user_id, ""]);
        Some(url)
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn fetch_profile(&self, token: &str) -> Option<Value> {
        let url = self.profile_url();
        let response = match self.client.get(&url).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "[IDENTITY] Profile request failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!(
                url = %url,
                status = response.status().as_u16(),
                "[IDENTITY] Profile request returned {}",
                response.status()
            );
            return None;
        }

        match response.json::<Value>().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(url = %url, error = %e, "[IDENTITY] Profile body is not JSON");
                None
            }
        }
    }

    async fn check_user(&self, user_id: &str, token: &str) -> UserCheck {
        let Some(url) = self.user_url(user_id) else {
            warn!(user_id = %user_id, "[IDENTITY] Cannot address user, treating as missing");
            return UserCheck::Missing;
        };
        match self.client.get(url).bearer_auth(token).send().await {
            Ok(response) => match response.status() {
                StatusCode::OK => UserCheck::Exists,
                StatusCode::NOT_FOUND => {
                    debug!(user_id = %user_id, "[IDENTITY] User not found");
                    UserCheck::Missing
                }
                status => {
                    warn!(
                        user_id = %user_id,
                        status = status.as_u16(),
                        "[IDENTITY] User check returned {}",
                        status
                    );
                    UserCheck::Unknown
                }
            },
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "[IDENTITY] User check failed");
                UserCheck::Unknown
            }
        }
    }
}

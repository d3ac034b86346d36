//! # Claims Schema
//!
//! Strict view of the identity claims this service reads from a token.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An identifier claim that issuers encode either as a string or a number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClaimId {
    Text(String),
    Number(i64),
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimId::Text(s) => write!(f, "{s}"),
            ClaimId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// JWT claims read by the chat service.
///
/// Identity resolution order:
/// - user id: `user_id`, then `sub`
/// - display name: `username`, then `email`, then empty
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Resolved user id, or `None` when neither claim carries a non-empty value.
    pub fn subject(&self) -> Option<String> {
        [&self.user_id, &self.sub]
            .into_iter()
            .flatten()
            .map(ToString::to_string)
            .find(|id| !id.trim().is_empty())
    }

    pub fn display_name(&self) -> String {
        [&self.username, &self.email]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

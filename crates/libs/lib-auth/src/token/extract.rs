//! # Handshake Credential Extraction
//!
//! Locates the bearer token on a connection handshake.
//!
//! Precedence: the `token` query parameter is checked first, then the
//! `Authorization: Bearer <token>` header. Browsers cannot attach headers to a
//! WebSocket handshake, so the query parameter is the primary channel.

use super::AuthFailure;

/// Pick the credential from the query parameter or the `Authorization` header value.
pub fn extract_token(
    query_token: Option<&str>,
    authorization: Option<&str>,
) -> Result<String, AuthFailure> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    authorization
        .and_then(|h| h.trim().strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(AuthFailure::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameter_takes_precedence() {
        let token = extract_token(Some("from-query"), Some("Bearer from-header")).unwrap();
        assert_eq!(token, "from-query");
    }

    #[test]
    fn test_header_fallback() {
        assert_eq!(extract_token(None, Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(extract_token(Some(""), Some("Bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_missing_everywhere() {
        assert_eq!(extract_token(None, None), Err(AuthFailure::MissingToken));
        assert_eq!(extract_token(None, Some("Basic abc")), Err(AuthFailure::MissingToken));
        assert_eq!(extract_token(None, Some("Bearer ")), Err(AuthFailure::MissingToken));
    }
}

//! Session-level authorization. This gate runs before any routing or
//! registry work: an unauthenticated caller gets an immediate 401, distinct
//! from every tool-level error shape.

use crate::config::RelayConfig;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

#[derive(Debug, Clone)]
pub struct AuthPolicy {
    gateway_token: Option<String>,
}

impl AuthPolicy {
    pub fn from_config(cfg: &RelayConfig) -> Self {
        Self {
            gateway_token: cfg
                .security
                .gateway_token
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.gateway_token.is_some()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(expected) = self.gateway_token.as_ref() else {
            return Ok(());
        };
        match parse_bearer_token(headers) {
            Some(token) if token == *expected => Ok(()),
            Some(_) => Err(AuthError::InvalidToken),
            None => Err(AuthError::MissingToken),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token")]
    InvalidToken,
}

fn parse_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = raw.trim().splitn(2, char::is_whitespace);
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn policy(token: Option<&str>) -> AuthPolicy {
        let mut cfg = RelayConfig::default();
        cfg.security.gateway_token = token.map(str::to_string);
        AuthPolicy::from_config(&cfg)
    }

    #[test]
    fn bearer_parsing_is_scheme_insensitive_and_trims() {
        assert_eq!(
            parse_bearer_token(&headers_with("Bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(
            parse_bearer_token(&headers_with("bearer  abc ")),
            Some("abc".to_string())
        );
        assert_eq!(parse_bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(parse_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn matching_token_authorizes() {
        assert!(policy(Some("s3cret"))
            .authorize(&headers_with("Bearer s3cret"))
            .is_ok());
    }

    #[test]
    fn wrong_or_missing_token_is_rejected() {
        let p = policy(Some("s3cret"));
        assert_eq!(
            p.authorize(&headers_with("Bearer nope")),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(p.authorize(&HeaderMap::new()), Err(AuthError::MissingToken));
    }

    #[test]
    fn empty_configured_token_disables_the_gate() {
        let p = policy(Some("   "));
        assert!(!p.requires_auth());
        assert!(p.authorize(&HeaderMap::new()).is_ok());
    }
}

//! Token location.
//!
//! A course link carries its token either directly (`ecs_hash`) or inside a
//! hash URL (`ecs_hash_url=<base>/sys/auths/<token>`). The hash URL form also
//! names the exchange service that issued the token, which narrows the set
//! of trust domains that have to be asked.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::params::{ECS_HASH, ECS_HASH_URL, ParamMap};

static HASH_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)/sys/auths/(?P<token>[^/]+)$").expect("valid hash URL pattern")
});

/// Errors while locating the token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The hash URL parameter does not have the `<base>/sys/auths/<token>` shape.
    #[error("Malformed hash URL: {0}")]
    MalformedHashUrl(String),
}

/// Where the token was found and, if known, who issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenLocation {
    /// The token to verify.
    pub token: String,

    /// Base URL of the issuing exchange service, when the link names it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_base_url: Option<String>,
}

/// Locates the token in the link parameters.
///
/// Returns `Ok(None)` when the link carries no token at all.
///
/// # Errors
///
/// Returns [`LinkError::MalformedHashUrl`] when only a hash URL is present and
/// it cannot be split into base URL and token. This is final for the request.
pub fn locate_token(params: &ParamMap) -> Result<Option<TokenLocation>, LinkError> {
    if let Some(token) = params.get(ECS_HASH) {
        return Ok(Some(TokenLocation {
            token: token.clone(),
            issuer_base_url: None,
        }));
    }

    let Some(hash_url) = params.get(ECS_HASH_URL) else {
        return Ok(None);
    };

    let captures = HASH_URL_PATTERN
        .captures(hash_url)
        .ok_or_else(|| LinkError::MalformedHashUrl(hash_url.clone()))?;

    Ok(Some(TokenLocation {
        token: captures["token"].to_string(),
        issuer_base_url: Some(captures["base"].to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_direct_token() {
        let location = locate_token(&params(&[("ecs_hash", "abc123")]))
            .unwrap()
            .unwrap();
        assert_eq!(location.token, "abc123");
        assert!(location.issuer_base_url.is_none());
    }

    #[test]
    fn test_direct_token_takes_precedence() {
        let location = locate_token(&params(&[
            ("ecs_hash", "direct"),
            ("ecs_hash_url", "https://ecs.example.org/sys/auths/fromurl"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(location.token, "direct");
    }

    #[test]
    fn test_hash_url() {
        let location = locate_token(&params(&[(
            "ecs_hash_url",
            "https://ecs.example.org:8443/ecs/sys/auths/e3b0c442",
        )]))
        .unwrap()
        .unwrap();
        assert_eq!(location.token, "e3b0c442");
        assert_eq!(
            location.issuer_base_url.as_deref(),
            Some("https://ecs.example.org:8443/ecs")
        );
    }

    #[test]
    fn test_malformed_hash_url() {
        let result = locate_token(&params(&[("ecs_hash_url", "https://ecs.example.org/auths/x")]));
        assert!(matches!(result, Err(LinkError::MalformedHashUrl(_))));

        let result = locate_token(&params(&[(
            "ecs_hash_url",
            "https://ecs.example.org/sys/auths/",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_no_token() {
        assert_eq!(locate_token(&params(&[("id", "3")])).unwrap(), None);
    }
}

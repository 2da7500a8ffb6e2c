//! Token claims returned by an exchange service.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The exchange service's answer for a token.
///
/// Produced per verification attempt and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaim {
    /// The token as known to the exchange service.
    pub token_hash: String,

    /// Signature over the request parameters, computed by the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    /// The claim is not honoured before this instant.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_of_validity: Option<OffsetDateTime>,

    /// The claim is not honoured after this instant.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_of_validity: Option<OffsetDateTime>,

    /// Participant that issued the token.
    pub issuer_participant_id: String,

    /// Participant the user is coming from.
    pub source_participant_id: String,
}

impl TokenClaim {
    /// Creates a claim without realm or validity window.
    #[must_use]
    pub fn new(
        token_hash: impl Into<String>,
        issuer_participant_id: impl Into<String>,
        source_participant_id: impl Into<String>,
    ) -> Self {
        Self {
            token_hash: token_hash.into(),
            realm: None,
            start_of_validity: None,
            end_of_validity: None,
            issuer_participant_id: issuer_participant_id.into(),
            source_participant_id: source_participant_id.into(),
        }
    }

    /// Sets the realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the validity window.
    #[must_use]
    pub fn with_validity(
        mut self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Self {
        self.start_of_validity = start;
        self.end_of_validity = end;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_claim_deserialization() {
        let claim: TokenClaim = serde_json::from_value(serde_json::json!({
            "token_hash": "abc",
            "realm": "f00",
            "end_of_validity": "2026-03-01T12:00:00Z",
            "issuer_participant_id": "4",
            "source_participant_id": "5"
        }))
        .unwrap();

        assert_eq!(claim.token_hash, "abc");
        assert_eq!(claim.realm.as_deref(), Some("f00"));
        assert!(claim.start_of_validity.is_none());
        assert_eq!(claim.end_of_validity, Some(datetime!(2026-03-01 12:00 UTC)));
    }
}

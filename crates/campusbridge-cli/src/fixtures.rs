//! Recorded exchange answers for offline replay.
//!
//! A claims file is a JSON object keyed by trust domain ID:
//!
//! ```json
//! {
//!   "ecs-main": { "token_hash": "abc", "issuer_participant_id": "7", "source_participant_id": "7" },
//!   "ecs-backup": { "transport_error": "connection refused" },
//!   "ecs-test": null
//! }
//! ```
//!
//! `null` or a missing entry means the domain does not know the token.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use campusbridge_auth::{LocalAccount, TokenClaim, TokenVerifier, TransportError, TrustDomain};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordedAnswer {
    Failure { transport_error: String },
    Claim(TokenClaim),
}

/// A [`TokenVerifier`] answering from recorded claims.
#[derive(Debug, Default)]
pub struct FixtureVerifier {
    answers: HashMap<String, Option<RecordedAnswer>>,
}

impl FixtureVerifier {
    pub fn from_json(json: &str) -> Result<Self> {
        let answers = serde_json::from_str(json).context("invalid claims file")?;
        Ok(Self { answers })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading claims file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn domain_count(&self) -> usize {
        self.answers.len()
    }
}

#[async_trait]
impl TokenVerifier for FixtureVerifier {
    async fn verify_token(
        &self,
        domain: &TrustDomain,
        _token: &str,
    ) -> Result<Option<TokenClaim>, TransportError> {
        match self.answers.get(&domain.id).cloned().flatten() {
            None => Ok(None),
            Some(RecordedAnswer::Claim(claim)) => Ok(Some(claim)),
            Some(RecordedAnswer::Failure { transport_error }) => {
                Err(TransportError::Connection(transport_error))
            }
        }
    }
}

/// Loads local accounts from a JSON array.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<LocalAccount>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading accounts file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid accounts file")
}

//! Exchange service client interface.
//!
//! The wire protocol to the exchange service lives outside this crate. The
//! verifier only needs a way to ask one trust domain about one token.

use std::time::Duration;

use async_trait::async_trait;

use super::claim::TokenClaim;
use super::domain::TrustDomain;

/// Errors raised while talking to an exchange service.
///
/// All variants are treated alike by the verifier: the domain is given up
/// for this request and the next one is tried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The exchange service did not answer in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or was lost.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The exchange service answered with something unusable.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Asks an exchange service about a token.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns the claim `domain` holds for `token`, or `None` if the token
    /// is unknown there.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange service could not be
    /// asked.
    async fn verify_token(
        &self,
        domain: &TrustDomain,
        token: &str,
    ) -> Result<Option<TokenClaim>, TransportError>;
}

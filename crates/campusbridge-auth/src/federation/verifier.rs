//! Token verification across trust domains.
//!
//! This module provides the [`TrustDomainVerifier`], which asks the
//! configured trust domains about a token one after another.
//!
//! # Overview
//!
//! Each domain yields a [`DomainOutcome`]:
//!
//! 1. **Skipped** - disabled, or the link names a different exchange service
//! 2. **TransportFailed** - the exchange service could not be asked
//! 3. **ContentRejected** - unknown token, hash, realm or validity window
//! 4. **PolicyRejected** - valid token, but the issuer's trust policy declines it
//! 5. **Verified** - valid token from a trusted participant
//!
//! The outcomes are folded into a [`VerificationOutcome`]. The first
//! verified domain wins. A policy rejection ends the search and discards
//! earlier transport failures. When no domain verified the token and at
//! least one failed at the transport layer, the result is a
//! [`VerificationOutcome::TransportFault`]; content rejections alone are
//! never escalated.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use super::claim::TokenClaim;
use super::domain::TrustDomain;
use super::participant::{Participant, ParticipantDirectory, TrustDecision};
use super::realm::{RealmAlgorithm, RealmInput, RealmScheme, Sha1Realm};
use super::transport::{TokenVerifier, TransportError};
use crate::AuthResult;
use crate::link::destination::CourseDestination;
use crate::link::params::ExternalIdentityParams;
use crate::link::token::TokenLocation;
use crate::link::url::same_ignoring_port;

/// A single verification request.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    /// The destination URL as received.
    pub destination_url: &'a str,
    /// The matched course.
    pub destination: &'a CourseDestination,
    /// The located token.
    pub token: &'a TokenLocation,
    /// The link's identity parameters.
    pub params: &'a ExternalIdentityParams,
    /// Reference time for the validity window.
    pub now: OffsetDateTime,
}

/// A token accepted by a trust domain.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The domain that verified the token.
    pub domain: TrustDomain,
    /// The claim returned by the domain.
    pub claim: TokenClaim,
    /// The trusted issuing participant.
    pub participant: Participant,
}

impl VerifiedToken {
    /// The participant the user is coming from.
    #[must_use]
    pub fn source_participant_id(&self) -> &str {
        &self.claim.source_participant_id
    }
}

/// Why a domain was not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The domain is disabled.
    Disabled,
    /// The link names a different exchange service.
    IssuerMismatch,
}

/// Why a domain's claim did not validate the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRejection {
    /// The domain does not know the token.
    UnknownToken,
    /// The claim belongs to a different token.
    HashMismatch,
    /// The recomputed realm differs from the claim's realm.
    RealmMismatch,
    /// The validity window has not started yet.
    NotYetValid,
    /// The validity window has ended.
    Expired,
}

impl fmt::Display for ContentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken => write!(f, "unknown_token"),
            Self::HashMismatch => write!(f, "hash_mismatch"),
            Self::RealmMismatch => write!(f, "realm_mismatch"),
            Self::NotYetValid => write!(f, "not_yet_valid"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Outcome of asking one trust domain.
#[derive(Debug, Clone)]
pub enum DomainOutcome {
    /// The domain verified the token.
    Verified(Box<VerifiedToken>),
    /// The domain was not asked.
    Skipped(SkipReason),
    /// The domain's claim does not validate the token.
    ContentRejected(ContentRejection),
    /// The token is valid but the trust policy declines it.
    PolicyRejected(String),
    /// The domain could not be asked.
    TransportFailed(TransportError),
}

/// A trust domain that failed at the transport layer.
#[derive(Debug, Clone)]
pub struct DomainFailure {
    /// The domain.
    pub domain: TrustDomain,
    /// What went wrong.
    pub error: TransportError,
}

/// Aggregate outcome over all trust domains.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    /// A domain verified the token.
    Verified(Box<VerifiedToken>),
    /// A domain recognised the token but its trust policy declined it.
    PolicyRejected {
        /// The domain whose policy declined the token.
        domain_id: String,
        /// The policy's reason.
        reason: String,
    },
    /// No domain verified the token.
    Unverified,
    /// No domain verified the token and at least one could not be asked.
    TransportFault {
        /// Domains that failed at the transport layer.
        failures: Vec<DomainFailure>,
    },
}

/// Verifies tokens against the configured trust domains, in order.
pub struct TrustDomainVerifier {
    domains: Vec<TrustDomain>,
    tokens: Arc<dyn TokenVerifier>,
    participants: Arc<dyn ParticipantDirectory>,
    realm: Arc<dyn RealmAlgorithm>,
    clock_skew_tolerance: Duration,
    request_timeout: Duration,
}

impl TrustDomainVerifier {
    /// Creates a verifier with the SHA-1 realm algorithm, no clock skew
    /// tolerance and a 10 second request timeout.
    #[must_use]
    pub fn new(
        domains: Vec<TrustDomain>,
        tokens: Arc<dyn TokenVerifier>,
        participants: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            domains,
            tokens,
            participants,
            realm: Arc::new(Sha1Realm),
            clock_skew_tolerance: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the realm algorithm.
    #[must_use]
    pub fn with_realm_algorithm(mut self, realm: Arc<dyn RealmAlgorithm>) -> Self {
        self.realm = realm;
        self
    }

    /// Sets the tolerance applied to both ends of the validity window.
    #[must_use]
    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }

    /// Sets the per-domain request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The configured trust domains, in consultation order.
    #[must_use]
    pub fn domains(&self) -> &[TrustDomain] {
        &self.domains
    }

    /// Verifies the token against all trust domains.
    ///
    /// # Errors
    ///
    /// Returns an error only if the trust policy backend fails. Transport
    /// failures are reported through [`VerificationOutcome::TransportFault`].
    pub async fn verify(&self, request: &VerificationRequest<'_>) -> AuthResult<VerificationOutcome> {
        let mut failures = Vec::new();

        for domain in &self.domains {
            match self.verify_with_domain(domain, request).await? {
                DomainOutcome::Verified(verified) => {
                    if !failures.is_empty() {
                        tracing::debug!(
                            domain = %domain.id,
                            failed_domains = failures.len(),
                            "Token verified after earlier transport failures"
                        );
                    }
                    return Ok(VerificationOutcome::Verified(verified));
                }
                DomainOutcome::PolicyRejected(reason) => {
                    return Ok(VerificationOutcome::PolicyRejected {
                        domain_id: domain.id.clone(),
                        reason,
                    });
                }
                DomainOutcome::TransportFailed(error) => {
                    tracing::warn!(domain = %domain.id, error = %error, "Trust domain unreachable");
                    failures.push(DomainFailure {
                        domain: domain.clone(),
                        error,
                    });
                }
                DomainOutcome::ContentRejected(rejection) => {
                    tracing::debug!(domain = %domain.id, reason = %rejection, "Token rejected by trust domain");
                }
                DomainOutcome::Skipped(reason) => {
                    tracing::trace!(domain = %domain.id, ?reason, "Trust domain skipped");
                }
            }
        }

        if failures.is_empty() {
            Ok(VerificationOutcome::Unverified)
        } else {
            Ok(VerificationOutcome::TransportFault { failures })
        }
    }

    /// Asks a single trust domain about the token.
    ///
    /// # Errors
    ///
    /// Returns an error only if the trust policy backend fails.
    pub async fn verify_with_domain(
        &self,
        domain: &TrustDomain,
        request: &VerificationRequest<'_>,
    ) -> AuthResult<DomainOutcome> {
        if !domain.enabled {
            return Ok(DomainOutcome::Skipped(SkipReason::Disabled));
        }
        if let Some(issuer) = &request.token.issuer_base_url
            && !same_ignoring_port(&domain.base_url, issuer)
        {
            return Ok(DomainOutcome::Skipped(SkipReason::IssuerMismatch));
        }

        let token = request.token.token.as_str();
        let lookup = tokio::time::timeout(
            self.request_timeout,
            self.tokens.verify_token(domain, token),
        )
        .await;
        let claim = match lookup {
            Err(_) => {
                return Ok(DomainOutcome::TransportFailed(TransportError::Timeout(
                    self.request_timeout,
                )));
            }
            Ok(Err(error)) => return Ok(DomainOutcome::TransportFailed(error)),
            Ok(Ok(None)) => return Ok(DomainOutcome::ContentRejected(ContentRejection::UnknownToken)),
            Ok(Ok(Some(claim))) => claim,
        };

        if let Err(rejection) = self.check_claim(&claim, request) {
            return Ok(DomainOutcome::ContentRejected(rejection));
        }

        let decision = self
            .participants
            .trust_policy(
                domain,
                &claim.issuer_participant_id,
                &request.destination.course_id,
            )
            .await?;

        match decision {
            TrustDecision::Rejected(reason) => {
                tracing::warn!(
                    domain = %domain.id,
                    participant = %claim.issuer_participant_id,
                    course = %request.destination.course_id,
                    reason = %reason,
                    "Trust policy declined a valid token"
                );
                Ok(DomainOutcome::PolicyRejected(reason))
            }
            TrustDecision::Trusted(participant) => {
                tracing::debug!(
                    domain = %domain.id,
                    participant = %participant.pid,
                    "Token verified"
                );
                Ok(DomainOutcome::Verified(Box::new(VerifiedToken {
                    domain: domain.clone(),
                    claim,
                    participant,
                })))
            }
        }
    }

    /// Checks hash, realm and validity window of a claim.
    fn check_claim(
        &self,
        claim: &TokenClaim,
        request: &VerificationRequest<'_>,
    ) -> Result<(), ContentRejection> {
        if claim.token_hash != request.token.token {
            return Err(ContentRejection::HashMismatch);
        }

        if let Some(realm) = &claim.realm {
            let scheme = RealmScheme::for_params(request.params);
            let expected = self.realm.compute(
                scheme,
                &RealmInput {
                    destination_url: request.destination_url,
                    course_url: &request.destination.course_url,
                    params: request.params,
                },
            );
            if &expected != realm {
                tracing::debug!(?scheme, "Realm mismatch");
                return Err(ContentRejection::RealmMismatch);
            }
        }

        check_validity_window(claim, request.now, self.clock_skew_tolerance)
    }
}

/// Checks `now` against the claim's validity window.
///
/// The window is inclusive on both ends and widened by `tolerance`. A
/// tolerance reaching past the representable date range leaves that end of
/// the window open.
///
/// # Errors
///
/// Returns [`ContentRejection::NotYetValid`] or [`ContentRejection::Expired`].
pub fn check_validity_window(
    claim: &TokenClaim,
    now: OffsetDateTime,
    tolerance: Duration,
) -> Result<(), ContentRejection> {
    let tolerance = time::Duration::try_from(tolerance).ok();
    let latest = tolerance.and_then(|t| now.checked_add(t));
    let earliest = tolerance.and_then(|t| now.checked_sub(t));

    if let (Some(start), Some(latest)) = (claim.start_of_validity, latest)
        && start > latest
    {
        return Err(ContentRejection::NotYetValid);
    }
    if let (Some(end), Some(earliest)) = (claim.end_of_validity, earliest)
        && end < earliest
    {
        return Err(ContentRejection::Expired);
    }
    Ok(())
}

//! Course link authentication service.
//!
//! [`LinkAuthenticator`] owns the whole pipeline: parameter extraction,
//! destination matching, token location, trust domain verification and
//! identity resolution. It holds no per-request state and can be shared
//! behind an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! let authenticator = LinkAuthenticator::builder(config)
//!     .token_verifier(Arc::new(EcsClient::new()))
//!     .build()?;
//!
//! match authenticator.authenticate(&url).await? {
//!     AuthOutcome::Authenticated(identity) => log_in(&identity.username),
//!     AuthOutcome::NotApplicable(_) => continue_normal_login(),
//!     AuthOutcome::Rejected(rejection) => deny(rejection),
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::BridgeConfig;
use crate::error::AuthError;
use crate::federation::participant::{ParticipantDirectory, StaticParticipantDirectory};
use crate::federation::realm::RealmAlgorithm;
use crate::federation::transport::TokenVerifier;
use crate::federation::verifier::{
    TrustDomainVerifier, VerificationOutcome, VerificationRequest, VerifiedToken,
};
use crate::identity::resolver::{
    IdentityError, IdentityResolver, ResolutionAction, ResolutionRequest,
};
use crate::link::destination::DestinationMatcher;
use crate::link::params::{ExternalIdentityParams, extract_params};
use crate::link::token::{LinkError, locate_token};
use crate::notify::{FaultNotifier, FaultReport, TracingFaultNotifier};
use crate::storage::account::AccountDirectory;
use crate::storage::correlation::{CorrelationStore, DomainLink};
use crate::storage::memory::{InMemoryAccountDirectory, InMemoryCorrelationStore};

/// The identity a course link authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    /// Local username to log in.
    pub username: String,

    /// Profile fields mapped from the link, keyed by local field name.
    pub local_profile_fields: BTreeMap<String, String>,

    /// Trust domain that verified the token.
    pub origin_domain_id: String,

    /// Participant the user came from.
    pub source_participant_id: String,

    /// Role the host should grant, from the domain's `import_role`.
    pub requested_role: String,

    /// How the username was obtained.
    pub action: ResolutionAction,

    /// Whether a suspended correlation was revived by this login.
    pub reactivated: bool,
}

/// Why a URL is not a course link this bridge handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotApplicable {
    /// The URL has no query parameters.
    NoQuery,
    /// The URL does not target a course on this site.
    NotCourseLink,
    /// The course link carries no token.
    NoToken,
}

impl fmt::Display for NotApplicable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoQuery => write!(f, "no_query"),
            Self::NotCourseLink => write!(f, "not_course_link"),
            Self::NoToken => write!(f, "no_token"),
        }
    }
}

/// Why a course link was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// The hash URL cannot be split into base URL and token.
    MalformedHashUrl {
        /// The offending parameter value.
        value: String,
    },
    /// No trust domain verified the token.
    Unverified,
    /// A trust domain recognised the token but its policy declined it.
    PolicyDenied {
        /// The declining domain.
        domain_id: String,
        /// The policy's reason.
        detail: String,
    },
    /// The link carries no usable person id.
    IncompleteIdentity {
        /// What is missing.
        detail: String,
    },
    /// The identity does not map to a single local account.
    AmbiguousIdentity {
        /// Why the mapping is ambiguous.
        detail: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHashUrl { value } => write!(f, "malformed hash URL: {value}"),
            Self::Unverified => write!(f, "token not verified by any trust domain"),
            Self::PolicyDenied { domain_id, detail } => {
                write!(f, "denied by trust domain {domain_id}: {detail}")
            }
            Self::IncompleteIdentity { detail } => write!(f, "incomplete identity: {detail}"),
            Self::AmbiguousIdentity { detail } => write!(f, "ambiguous identity: {detail}"),
        }
    }
}

/// Result of authenticating a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AuthOutcome {
    /// The link authenticated a user.
    Authenticated(ResolvedIdentity),
    /// The URL is not a course link with a token; normal login applies.
    NotApplicable(NotApplicable),
    /// The link was refused.
    Rejected(Rejection),
}

impl AuthOutcome {
    /// Returns the resolved identity, if authenticated.
    #[must_use]
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Returns `true` if a user was authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns `true` if the link was refused.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Authenticates users arriving through course links.
pub struct LinkAuthenticator {
    matcher: DestinationMatcher,
    verifier: TrustDomainVerifier,
    resolver: IdentityResolver,
    notifier: Arc<dyn FaultNotifier>,
}

impl LinkAuthenticator {
    /// Starts building an authenticator from configuration.
    #[must_use]
    pub fn builder(config: BridgeConfig) -> LinkAuthenticatorBuilder {
        LinkAuthenticatorBuilder::new(config)
    }

    /// The trust domain verifier.
    #[must_use]
    pub fn verifier(&self) -> &TrustDomainVerifier {
        &self.verifier
    }

    /// Authenticates `url` at the current time.
    ///
    /// # Errors
    ///
    /// See [`authenticate_at`](Self::authenticate_at).
    pub async fn authenticate(&self, url: &str) -> AuthResult<AuthOutcome> {
        self.authenticate_at(url, OffsetDateTime::now_utc()).await
    }

    /// Authenticates `url`, evaluating validity windows at `now`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ExchangeUnavailable`] if no domain verified the token
    ///   and at least one could not be reached (administrators are notified
    ///   first)
    /// - [`AuthError::Storage`] or [`AuthError::UsernameExhausted`] if
    ///   correlation or account storage fails
    pub async fn authenticate_at(&self, url: &str, now: OffsetDateTime) -> AuthResult<AuthOutcome> {
        let params = extract_params(url);
        if params.is_empty() {
            tracing::trace!("URL has no query parameters");
            return Ok(AuthOutcome::NotApplicable(NotApplicable::NoQuery));
        }

        let Some(destination) = self.matcher.match_destination(url, &params) else {
            tracing::trace!("URL does not target a course on this site");
            return Ok(AuthOutcome::NotApplicable(NotApplicable::NotCourseLink));
        };

        let token = match locate_token(&params) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::trace!(course = %destination.course_id, "Course link carries no token");
                return Ok(AuthOutcome::NotApplicable(NotApplicable::NoToken));
            }
            Err(LinkError::MalformedHashUrl(value)) => {
                tracing::debug!(course = %destination.course_id, hash_url = %value, "Malformed hash URL");
                return Ok(AuthOutcome::Rejected(Rejection::MalformedHashUrl { value }));
            }
        };

        let identity = ExternalIdentityParams::from_params(&params);
        let request = VerificationRequest {
            destination_url: url,
            destination: &destination,
            token: &token,
            params: &identity,
            now,
        };

        let verified = match self.verifier.verify(&request).await? {
            VerificationOutcome::Verified(verified) => verified,
            VerificationOutcome::PolicyRejected { domain_id, reason } => {
                return Ok(AuthOutcome::Rejected(Rejection::PolicyDenied {
                    domain_id,
                    detail: reason,
                }));
            }
            VerificationOutcome::Unverified => {
                tracing::debug!(course = %destination.course_id, "Token not verified by any trust domain");
                return Ok(AuthOutcome::Rejected(Rejection::Unverified));
            }
            VerificationOutcome::TransportFault { failures } => {
                let report = FaultReport::new(&failures, destination.course_id.clone(), now);
                if let Err(e) = self.notifier.notify(&report).await {
                    tracing::warn!(error = %e, "Failed to deliver fault report");
                }
                return Err(AuthError::exchange_unavailable(report.domain_ids()));
            }
        };

        self.resolve(&identity, &verified, now).await
    }

    async fn resolve(
        &self,
        identity: &ExternalIdentityParams,
        verified: &VerifiedToken,
        now: OffsetDateTime,
    ) -> AuthResult<AuthOutcome> {
        let request = ResolutionRequest {
            params: identity,
            participant: &verified.participant,
            link: DomainLink::new(&verified.domain.id, verified.source_participant_id()),
            now,
        };

        let resolution = match self.resolver.resolve(&request).await {
            Ok(resolution) => resolution,
            Err(IdentityError::Storage(e)) => return Err(e),
            Err(IdentityError::Incomplete(e)) => {
                tracing::warn!(domain = %verified.domain.id, error = %e, "Verified link with incomplete identity");
                return Ok(AuthOutcome::Rejected(Rejection::IncompleteIdentity {
                    detail: e.to_string(),
                }));
            }
            Err(e) => {
                tracing::warn!(domain = %verified.domain.id, error = %e, "Ambiguous identity");
                return Ok(AuthOutcome::Rejected(Rejection::AmbiguousIdentity {
                    detail: e.to_string(),
                }));
            }
        };

        tracing::info!(
            username = %resolution.username,
            domain = %verified.domain.id,
            participant = %verified.source_participant_id(),
            action = %resolution.action,
            "Course link authenticated"
        );

        Ok(AuthOutcome::Authenticated(ResolvedIdentity {
            username: resolution.username,
            local_profile_fields: verified.participant.field_mapping.map_profile(identity),
            origin_domain_id: verified.domain.id.clone(),
            source_participant_id: verified.source_participant_id().to_string(),
            requested_role: verified.domain.import_role.clone(),
            action: resolution.action,
            reactivated: resolution.reactivated,
        }))
    }
}

/// Builder for [`LinkAuthenticator`].
///
/// Only the token verifier is required. Participants default to the
/// configured `[[participants]]`, storage to in-memory backends, the realm
/// algorithm to SHA-1 and fault notification to the log.
pub struct LinkAuthenticatorBuilder {
    config: BridgeConfig,
    tokens: Option<Arc<dyn TokenVerifier>>,
    participants: Option<Arc<dyn ParticipantDirectory>>,
    correlations: Option<Arc<dyn CorrelationStore>>,
    accounts: Option<Arc<dyn AccountDirectory>>,
    realm: Option<Arc<dyn RealmAlgorithm>>,
    notifier: Option<Arc<dyn FaultNotifier>>,
}

impl LinkAuthenticatorBuilder {
    fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            tokens: None,
            participants: None,
            correlations: None,
            accounts: None,
            realm: None,
            notifier: None,
        }
    }

    /// Sets the exchange service client.
    #[must_use]
    pub fn token_verifier(mut self, tokens: Arc<dyn TokenVerifier>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sets the participant trust policy.
    #[must_use]
    pub fn participant_directory(mut self, participants: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(participants);
        self
    }

    /// Sets the correlation store.
    #[must_use]
    pub fn correlation_store(mut self, correlations: Arc<dyn CorrelationStore>) -> Self {
        self.correlations = Some(correlations);
        self
    }

    /// Sets the account directory.
    #[must_use]
    pub fn account_directory(mut self, accounts: Arc<dyn AccountDirectory>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Sets the realm algorithm.
    #[must_use]
    pub fn realm_algorithm(mut self, realm: Arc<dyn RealmAlgorithm>) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Sets the fault notifier.
    #[must_use]
    pub fn fault_notifier(mut self, notifier: Arc<dyn FaultNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validates the configuration and builds the authenticator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the configuration is invalid
    /// or no token verifier was set.
    pub fn build(self) -> AuthResult<LinkAuthenticator> {
        self.config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let tokens = self
            .tokens
            .ok_or_else(|| AuthError::configuration("a token verifier is required"))?;
        let participants = match self.participants {
            Some(participants) => participants,
            None => Arc::new(
                StaticParticipantDirectory::from_config(&self.config)
                    .map_err(|e| AuthError::configuration(e.to_string()))?,
            ),
        };
        let correlations = self
            .correlations
            .unwrap_or_else(|| Arc::new(InMemoryCorrelationStore::new()));
        let accounts = self
            .accounts
            .unwrap_or_else(|| Arc::new(InMemoryAccountDirectory::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingFaultNotifier));

        let BridgeConfig {
            site,
            verification,
            usernames,
            domains,
            ..
        } = self.config;

        let mut verifier = TrustDomainVerifier::new(domains, tokens, participants)
            .with_clock_skew_tolerance(verification.clock_skew_tolerance)
            .with_request_timeout(verification.request_timeout);
        if let Some(realm) = self.realm {
            verifier = verifier.with_realm_algorithm(realm);
        }

        Ok(LinkAuthenticator {
            matcher: DestinationMatcher::new(site.base_url),
            verifier,
            resolver: IdentityResolver::new(correlations, accounts, usernames),
            notifier,
        })
    }
}

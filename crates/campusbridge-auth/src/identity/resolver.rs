//! Identity resolution.
//!
//! This module maps an external identity, as carried by a verified course
//! link, to exactly one local username.
//!
//! # Resolution Flow
//!
//! 1. Extract the person id from the link parameters
//! 2. Known correlation: reuse its username and record the new domain link
//! 3. Matchable id type with a configured identity field: reuse the single
//!    matching local account
//! 4. Otherwise synthesise a fresh username
//!
//! New correlations are inserted atomically. An insert that loses a race
//! against a concurrent login for the same person reuses the winner's record.

use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;

use super::person::{IncompleteIdentity, PersonId, PersonIdType, extract_person_id};
use super::username::UsernameCandidates;
use crate::config::UsernameConfig;
use crate::error::AuthError;
use crate::federation::participant::Participant;
use crate::link::params::ExternalIdentityParams;
use crate::storage::account::AccountDirectory;
use crate::storage::correlation::{CorrelationRecord, CorrelationStore, DomainLink, InsertOutcome};

/// How the username was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    /// The person was already correlated.
    ExistingCorrelation,

    /// An existing local account was matched through an identity field.
    MatchedAccount,

    /// A new username was synthesised.
    Created,
}

impl ResolutionAction {
    /// Returns `true` if a new username was synthesised.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }

    /// Returns `true` if an existing account was newly correlated.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::MatchedAccount)
    }

    /// Returns `true` if an existing correlation was found.
    #[must_use]
    pub fn is_existing(&self) -> bool {
        matches!(self, Self::ExistingCorrelation)
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistingCorrelation => write!(f, "existing_correlation"),
            Self::MatchedAccount => write!(f, "matched_account"),
            Self::Created => write!(f, "created"),
        }
    }
}

/// Errors that can occur during identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// No usable person id in the link.
    #[error("Incomplete identity: {0}")]
    Incomplete(#[from] IncompleteIdentity),

    /// More than one local account matches the person id.
    #[error("{count} accounts match {kind} on field '{field}'")]
    MultipleMatches {
        /// The person id type.
        kind: PersonIdType,
        /// The local field that was searched.
        field: String,
        /// Number of matching accounts.
        count: usize,
    },

    /// The only matching account already belongs to another external identity.
    #[error("Account '{username}' is already correlated with another identity")]
    AlreadyCorrelated {
        /// The matched account.
        username: String,
    },

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] AuthError),
}

impl IdentityError {
    /// Returns `true` if the identity could not be mapped to a single account.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::MultipleMatches { .. } | Self::AlreadyCorrelated { .. })
    }
}

/// Input for a single resolution.
#[derive(Debug, Clone)]
pub struct ResolutionRequest<'a> {
    /// The link's identity parameters.
    pub params: &'a ExternalIdentityParams,
    /// The trusted participant that issued the token.
    pub participant: &'a Participant,
    /// The `(domain, source participant)` pair the user arrives from.
    pub link: DomainLink,
    /// Reference time for record timestamps.
    pub now: OffsetDateTime,
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The local username.
    pub username: String,
    /// The external person id.
    pub person_id: PersonId,
    /// How the username was obtained.
    pub action: ResolutionAction,
    /// Whether a suspended correlation was revived.
    pub reactivated: bool,
}

/// Resolves external identities to local usernames.
pub struct IdentityResolver {
    correlations: Arc<dyn CorrelationStore>,
    accounts: Arc<dyn AccountDirectory>,
    config: UsernameConfig,
}

impl IdentityResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new(
        correlations: Arc<dyn CorrelationStore>,
        accounts: Arc<dyn AccountDirectory>,
        config: UsernameConfig,
    ) -> Self {
        Self {
            correlations,
            accounts,
            config,
        }
    }

    /// Resolves the identity carried by a verified link.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::Incomplete`] if the link carries no usable person id
    /// - [`IdentityError::MultipleMatches`] or [`IdentityError::AlreadyCorrelated`]
    ///   if account matching is ambiguous
    /// - [`IdentityError::Storage`] if a storage operation fails or no free
    ///   username is found within `max_attempts`
    pub async fn resolve(&self, request: &ResolutionRequest<'_>) -> Result<Resolution, IdentityError> {
        let person_id = extract_person_id(request.params)?;

        if let Some(record) = self.correlations.find_by_external_id(&person_id).await? {
            return self
                .reuse(record.username, person_id, ResolutionAction::ExistingCorrelation, request)
                .await;
        }

        if let Some(resolution) = self.match_account(&person_id, request).await? {
            return Ok(resolution);
        }

        self.synthesize(person_id, request).await
    }

    /// Matches an existing account through the participant's identity field.
    async fn match_account(
        &self,
        person_id: &PersonId,
        request: &ResolutionRequest<'_>,
    ) -> Result<Option<Resolution>, IdentityError> {
        if person_id.kind.is_inherently_unique() {
            return Ok(None);
        }
        let Some(field) = request.participant.field_mapping.identity_field(person_id.kind) else {
            return Ok(None);
        };

        let mut matches = self
            .accounts
            .find_accounts_by_field(field, &person_id.value)
            .await?;

        let account = match matches.len() {
            0 => return Ok(None),
            1 => matches.remove(0),
            count => {
                return Err(IdentityError::MultipleMatches {
                    kind: person_id.kind,
                    field: field.to_string(),
                    count,
                });
            }
        };

        if let Some(existing) = self.correlations.find_by_username(&account.username).await? {
            if !existing.is_for(person_id) {
                return Err(IdentityError::AlreadyCorrelated {
                    username: account.username,
                });
            }
            return self
                .reuse(existing.username, person_id.clone(), ResolutionAction::ExistingCorrelation, request)
                .await
                .map(Some);
        }

        let record = CorrelationRecord::new(&account.username, person_id, request.link.clone(), request.now);
        match self.correlations.insert(record).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    username = %account.username,
                    kind = %person_id.kind,
                    field = %field,
                    "Correlated existing account"
                );
                Ok(Some(Resolution {
                    username: account.username,
                    person_id: person_id.clone(),
                    action: ResolutionAction::MatchedAccount,
                    reactivated: false,
                }))
            }
            InsertOutcome::IdentityExists(existing) => self
                .reuse(existing.username, person_id.clone(), ResolutionAction::ExistingCorrelation, request)
                .await
                .map(Some),
            InsertOutcome::UsernameTaken => Err(IdentityError::AlreadyCorrelated {
                username: account.username,
            }),
        }
    }

    /// Synthesises a new username and stores the correlation.
    async fn synthesize(
        &self,
        person_id: PersonId,
        request: &ResolutionRequest<'_>,
    ) -> Result<Resolution, IdentityError> {
        let candidates = UsernameCandidates::new(
            &request.participant.org_abbr,
            request.params.login.as_deref(),
        );
        let base = candidates.base().to_string();

        for candidate in candidates.take(self.config.max_attempts as usize) {
            if self.accounts.username_exists(&candidate).await?
                || self.correlations.find_by_username(&candidate).await?.is_some()
            {
                continue;
            }

            let record = CorrelationRecord::new(&candidate, &person_id, request.link.clone(), request.now);
            match self.correlations.insert(record).await? {
                InsertOutcome::Inserted => {
                    tracing::info!(
                        username = %candidate,
                        kind = %person_id.kind,
                        participant = %request.participant.pid,
                        "Created correlation for new identity"
                    );
                    return Ok(Resolution {
                        username: candidate,
                        person_id,
                        action: ResolutionAction::Created,
                        reactivated: false,
                    });
                }
                InsertOutcome::IdentityExists(existing) => {
                    tracing::debug!(username = %existing.username, "Identity created concurrently");
                    return self
                        .reuse(existing.username, person_id, ResolutionAction::ExistingCorrelation, request)
                        .await;
                }
                InsertOutcome::UsernameTaken => {
                    tracing::debug!(candidate = %candidate, "Username taken concurrently");
                }
            }
        }

        Err(IdentityError::Storage(AuthError::UsernameExhausted {
            base,
            attempts: self.config.max_attempts,
        }))
    }

    /// Records the authentication on an existing correlation.
    async fn reuse(
        &self,
        username: String,
        person_id: PersonId,
        action: ResolutionAction,
        request: &ResolutionRequest<'_>,
    ) -> Result<Resolution, IdentityError> {
        let update = self
            .correlations
            .record_authentication(&username, &request.link, request.now)
            .await?
            .ok_or_else(|| AuthError::storage(format!("correlation for '{username}' vanished")))?;

        if update.reactivated {
            tracing::info!(username = %username, "Reactivated suspended correlation");
        }

        Ok(Resolution {
            username,
            person_id,
            action,
            reactivated: update.reactivated,
        })
    }
}

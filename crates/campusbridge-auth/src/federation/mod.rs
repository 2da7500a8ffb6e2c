//! Trust domain federation.
//!
//! This module talks to the exchange services the site trusts:
//!
//! - [`domain`] - trust domain configuration
//! - [`claim`] - token claims returned by an exchange service
//! - [`transport`] - the client interface to an exchange service
//! - [`realm`] - realm recomputation for tamper detection
//! - [`participant`] - participant trust policy and field mappings
//! - [`verifier`] - token verification across all trust domains

pub mod claim;
pub mod domain;
pub mod participant;
pub mod realm;
pub mod transport;
pub mod verifier;

pub use claim::TokenClaim;
pub use domain::TrustDomain;
pub use participant::{
    FieldMapping, Participant, ParticipantConfig, ParticipantDirectory,
    StaticParticipantDirectory, TrustDecision,
};
pub use realm::{RealmAlgorithm, RealmInput, RealmScheme, Sha1Realm, strip_token_params};
pub use transport::{TokenVerifier, TransportError};
pub use verifier::{
    ContentRejection, DomainFailure, DomainOutcome, SkipReason, TrustDomainVerifier,
    VerificationOutcome, VerificationRequest, VerifiedToken, check_validity_window,
};

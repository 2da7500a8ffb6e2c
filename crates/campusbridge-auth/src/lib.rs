//! # campusbridge-auth
//!
//! Course link authentication for CampusConnect federations.
//!
//! A partner institution sends a user to a course on this site through a
//! link carrying a one-time token and the user's external identity. This
//! crate provides:
//! - Query parameter extraction and course destination matching
//! - Token location, including hash URLs naming the issuing exchange service
//! - Token verification against every configured trust domain
//! - Realm recomputation to detect tampered links
//! - Identity resolution to a single local username, with correlation storage
//! - Fault reporting when no exchange service can be reached
//!
//! ## Overview
//!
//! The entry point is [`LinkAuthenticator`]. Given a destination URL it
//! returns an [`AuthOutcome`]: the authenticated identity, a reason why the
//! URL is not a course link at all, or a rejection. Transport collaborators
//! and storage are traits, so hosts plug in their own exchange client,
//! account lookup and persistence.
//!
//! ## Modules
//!
//! - [`config`] - Bridge configuration
//! - [`link`] - Course link parsing
//! - [`federation`] - Trust domains, claims, realms and verification
//! - [`identity`] - Person ids, username synthesis and identity resolution
//! - [`storage`] - Correlation and account storage traits
//! - [`notify`] - Fault reports for unreachable exchange services
//! - [`service`] - The authentication pipeline

pub mod config;
pub mod error;
pub mod federation;
pub mod identity;
pub mod link;
pub mod notify;
pub mod service;
pub mod storage;

pub use config::{BridgeConfig, ConfigError, SiteConfig, UsernameConfig, VerificationConfig};
pub use error::{AuthError, ErrorCategory};
pub use federation::{
    ParticipantDirectory, RealmAlgorithm, Sha1Realm, StaticParticipantDirectory, TokenClaim,
    TokenVerifier, TransportError, TrustDomain, TrustDomainVerifier, VerificationOutcome,
};
pub use identity::{IdentityResolver, PersonId, PersonIdType, ResolutionAction};
pub use notify::{FaultNotifier, FaultReport, TracingFaultNotifier};
pub use service::{
    AuthOutcome, LinkAuthenticator, LinkAuthenticatorBuilder, NotApplicable, Rejection,
    ResolvedIdentity,
};
pub use storage::{
    AccountDirectory, CorrelationRecord, CorrelationStore, DomainLink, InMemoryAccountDirectory,
    InMemoryCorrelationStore, LocalAccount,
};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use campusbridge_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{BridgeConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::federation::{
        ParticipantDirectory, TokenClaim, TokenVerifier, TransportError, TrustDomain,
    };
    pub use crate::notify::{FaultNotifier, FaultReport};
    pub use crate::service::{AuthOutcome, LinkAuthenticator, Rejection, ResolvedIdentity};
    pub use crate::storage::{AccountDirectory, CorrelationStore, LocalAccount};
}

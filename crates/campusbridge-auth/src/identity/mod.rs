//! External identity handling.
//!
//! - [`person`] - person id types and extraction from link parameters
//! - [`username`] - username synthesis
//! - [`resolver`] - mapping external identities to local usernames

pub mod person;
pub mod resolver;
pub mod username;

pub use person::{IncompleteIdentity, PersonId, PersonIdType, extract_person_id};
pub use resolver::{IdentityError, IdentityResolver, Resolution, ResolutionAction, ResolutionRequest};
pub use username::{UsernameCandidates, sanitize_username};

//! Course link parsing.
//!
//! This module turns a raw destination URL into the pieces the verifier
//! needs:
//!
//! - [`params`] - query parameter extraction and typed identity parameters
//! - [`destination`] - recognising links to local courses
//! - [`token`] - locating the token and its issuing exchange service
//! - [`url`] - URL normalisation for base URL comparison

pub mod destination;
pub mod params;
pub mod token;
pub mod url;

pub use destination::{CourseDestination, DestinationForm, DestinationMatcher};
pub use params::{ExternalIdentityParams, ParamMap, extract_params};
pub use token::{LinkError, TokenLocation, locate_token};
pub use self::url::{same_ignoring_port, strip_port};

//! Storage traits for correlation and account data.
//!
//! This module defines storage interfaces for:
//!
//! - Correlation records linking external identities to local usernames
//! - Read access to the host's local accounts
//!
//! # Implementations
//!
//! - [`memory`] - `DashMap` backed in-memory storage

pub mod account;
pub mod correlation;
pub mod memory;

pub use account::{AccountDirectory, LocalAccount};
pub use correlation::{
    AuthenticationUpdate, CorrelationRecord, CorrelationStore, DomainLink, InsertOutcome,
};
pub use memory::{InMemoryAccountDirectory, InMemoryCorrelationStore};

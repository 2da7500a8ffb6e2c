//! Authentication error types.
//!
//! This module defines the crate-wide error type. Errors returned from
//! [`LinkAuthenticator::authenticate`](crate::service::LinkAuthenticator::authenticate)
//! are faults an operator has to look at; ordinary authentication failures are
//! reported through [`AuthOutcome`](crate::service::AuthOutcome) instead.

use std::fmt;

/// Errors that can occur while authenticating a course link.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Every consulted trust domain failed at the transport layer.
    #[error("Exchange service unavailable: {}", domains.join(", "))]
    ExchangeUnavailable {
        /// IDs of the trust domains that could not be reached.
        domains: Vec<String>,
    },

    /// An error occurred while storing or retrieving correlation or account data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// No free username could be generated for a new identity.
    #[error("Username space exhausted for base '{base}' after {attempts} attempts")]
    UsernameExhausted {
        /// The sanitised username base.
        base: String,
        /// Number of candidates tried.
        attempts: u32,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `ExchangeUnavailable` error.
    #[must_use]
    pub fn exchange_unavailable(domains: Vec<String>) -> Self {
        Self::ExchangeUnavailable { domains }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the error was caused by an unreachable exchange service.
    #[must_use]
    pub fn is_exchange_error(&self) -> bool {
        matches!(self, Self::ExchangeUnavailable { .. })
    }

    /// Returns `true` if the error originates from a storage backend.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::UsernameExhausted { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ExchangeUnavailable { .. } => ErrorCategory::Federation,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::UsernameExhausted { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Exchange service federation errors.
    Federation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Federation => write!(f, "federation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

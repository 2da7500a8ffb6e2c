//! Bridge configuration.
//!
//! This module provides the configuration types for the course-link
//! authentication bridge: the local site, verification limits, username
//! generation, the configured trust domains and their participants.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::federation::domain::TrustDomain;
use crate::federation::participant::ParticipantConfig;

/// Root configuration for the authentication bridge.
///
/// # Example (TOML)
///
/// ```toml
/// [site]
/// base_url = "https://lms.example.edu"
///
/// [verification]
/// clock_skew_tolerance = "0s"
/// request_timeout = "10s"
///
/// [[domains]]
/// id = "ecs-main"
/// base_url = "https://ecs.example.org/ecs"
/// import_role = "student"
///
/// [[participants]]
/// domain = "ecs-main"
/// pid = "7"
/// org_abbr = "UNIA"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// The local site that course links point at.
    pub site: SiteConfig,

    /// Token verification settings.
    pub verification: VerificationConfig,

    /// Username generation settings.
    pub usernames: UsernameConfig,

    /// Trust domains, consulted in this order.
    pub domains: Vec<TrustDomain>,

    /// Trust policy and field mapping per participant.
    pub participants: Vec<ParticipantConfig>,
}

/// Local site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public base URL of this site, without trailing slash.
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
        }
    }
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Tolerance applied to both ends of a token's validity window.
    #[serde(with = "humantime_serde")]
    pub clock_skew_tolerance: Duration,

    /// Upper bound for a single `verify_token` call against one trust domain.
    /// Exceeding it counts as a transport failure for that domain.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Username generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UsernameConfig {
    /// Maximum number of candidates tried before giving up.
    pub max_attempts: u32,
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self { max_attempts: 1000 }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl BridgeConfig {
    /// Looks up a configured trust domain by ID.
    #[must_use]
    pub fn domain(&self, id: &str) -> Option<&TrustDomain> {
        self.domains.iter().find(|d| d.id == id)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The site base URL or a domain base URL is not an absolute URL
    /// - Two domains share an ID
    /// - A participant refers to an unknown domain or has an invalid mapping
    /// - `usernames.max_attempts` is zero
    ///
    /// Returns `ConfigError::Missing` if a domain ID or participant
    /// organisation abbreviation is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.base_url.is_empty() {
            return Err(ConfigError::Missing("site.base_url".to_string()));
        }
        Url::parse(&self.site.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "site.base_url '{}' is not a valid URL: {}",
                self.site.base_url, e
            ))
        })?;

        if self.usernames.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "usernames.max_attempts must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.id.is_empty() {
                return Err(ConfigError::Missing("domains[].id".to_string()));
            }
            if !seen.insert(domain.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Duplicate trust domain id: '{}'",
                    domain.id
                )));
            }
            Url::parse(&domain.base_url).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "Trust domain '{}' has invalid base_url '{}': {}",
                    domain.id, domain.base_url, e
                ))
            })?;
        }

        for participant in &self.participants {
            if !seen.contains(participant.domain.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Participant {} refers to unknown trust domain '{}'",
                    participant.pid, participant.domain
                )));
            }
            if participant.org_abbr.is_empty() {
                return Err(ConfigError::Missing(format!(
                    "participants[{}].org_abbr",
                    participant.pid
                )));
            }
            participant.field_mapping()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(id: &str) -> TrustDomain {
        TrustDomain::new(id, "https://ecs.example.org/ecs")
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.site.base_url, "http://localhost");
        assert_eq!(config.verification.clock_skew_tolerance, Duration::ZERO);
        assert_eq!(config.verification.request_timeout, Duration::from_secs(10));
        assert_eq!(config.usernames.max_attempts, 1000);
        assert!(config.domains.is_empty());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_site_fails_validation() {
        let mut config = BridgeConfig::default();
        config.site.base_url = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_duplicate_domain_fails_validation() {
        let mut config = BridgeConfig::default();
        config.domains = vec![domain("ecs"), domain("ecs")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_invalid_domain_url_fails_validation() {
        let mut config = BridgeConfig::default();
        config.domains = vec![TrustDomain::new("ecs", "not a url")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }

    #[test]
    fn test_participant_unknown_domain_fails_validation() {
        let mut config = BridgeConfig::default();
        config.domains = vec![domain("ecs")];
        config.participants = vec![ParticipantConfig::new("other", "3", "ORG")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown trust domain"));
    }

    #[test]
    fn test_zero_attempts_fails_validation() {
        let mut config = BridgeConfig::default();
        config.usernames.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: BridgeConfig = serde_json::from_value(serde_json::json!({
            "site": { "base_url": "https://lms.example.edu" },
            "verification": { "clock_skew_tolerance": "30s" },
            "domains": [
                { "id": "ecs", "base_url": "https://ecs.example.org/ecs", "import_role": "student" }
            ],
            "participants": [
                { "domain": "ecs", "pid": "7", "org_abbr": "UNIA" }
            ]
        }))
        .unwrap();

        assert_eq!(config.site.base_url, "https://lms.example.edu");
        assert_eq!(
            config.verification.clock_skew_tolerance,
            Duration::from_secs(30)
        );
        assert_eq!(config.verification.request_timeout, Duration::from_secs(10));
        assert_eq!(config.domain("ecs").unwrap().import_role, "student");
        assert!(config.validate().is_ok());
    }
}

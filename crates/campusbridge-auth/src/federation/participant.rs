//! Participants and their trust policy.
//!
//! A participant is a peer system inside a trust domain's community. Before
//! a verified token is accepted, the issuing participant's trust policy is
//! consulted: it may decline the token for the requested course. The same
//! lookup supplies the participant's field mapping and organisation
//! abbreviation used during identity resolution.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::TrustDomain;
use crate::AuthResult;
use crate::config::{BridgeConfig, ConfigError};
use crate::identity::person::PersonIdType;
use crate::link::params::{
    ECS_EMAIL, ECS_FIRSTNAME, ECS_INSTITUTION, ECS_LASTNAME, ExternalIdentityParams,
};

/// Maps external identity parameters to local account fields.
///
/// Only the `identity_fields` configured here are ever used to match
/// existing accounts. Parameter names arriving in a link never select a
/// local field on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    identity_fields: BTreeMap<PersonIdType, String>,
    profile_fields: BTreeMap<String, String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        let profile_fields = [
            ("firstname", ECS_FIRSTNAME),
            ("lastname", ECS_LASTNAME),
            ("email", ECS_EMAIL),
            ("institution", ECS_INSTITUTION),
        ]
        .into_iter()
        .map(|(local, external)| (local.to_string(), external.to_string()))
        .collect();

        Self {
            identity_fields: BTreeMap::new(),
            profile_fields,
        }
    }
}

impl FieldMapping {
    /// Creates a mapping with the default profile fields and no identity fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a person id type to the local account field holding it.
    #[must_use]
    pub fn with_identity_field(mut self, kind: PersonIdType, local_field: impl Into<String>) -> Self {
        self.identity_fields.insert(kind, local_field.into());
        self
    }

    /// Replaces the profile field mapping (local field -> external parameter).
    #[must_use]
    pub fn with_profile_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.profile_fields = fields;
        self
    }

    /// Returns the local account field configured for matching ids of `kind`.
    #[must_use]
    pub fn identity_field(&self, kind: PersonIdType) -> Option<&str> {
        self.identity_fields.get(&kind).map(String::as_str)
    }

    /// Builds local profile fields from the external parameters.
    ///
    /// Fields whose external parameter is absent or empty are left out.
    #[must_use]
    pub fn map_profile(&self, params: &ExternalIdentityParams) -> BTreeMap<String, String> {
        self.profile_fields
            .iter()
            .filter_map(|(local, external)| {
                params
                    .get_non_empty(external)
                    .map(|value| (local.clone(), value.to_string()))
            })
            .collect()
    }
}

/// A trusted participant, as returned by the trust policy lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Trust domain the participant belongs to.
    pub domain_id: String,
    /// Participant id within the trust domain.
    pub pid: String,
    /// Organisation abbreviation, used as username prefix.
    pub org_abbr: String,
    /// Field mapping for users coming from this participant.
    pub field_mapping: FieldMapping,
}

/// Result of a trust policy lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// The participant may send users to the course.
    Trusted(Participant),
    /// The token is valid but the policy declines it.
    Rejected(String),
}

/// Trust policy lookup for participants.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Decides whether `participant_id` in `domain` may send users to `course_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy backend fails.
    async fn trust_policy(
        &self,
        domain: &TrustDomain,
        participant_id: &str,
        course_id: &str,
    ) -> AuthResult<TrustDecision>;
}

/// Participant configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [[participants]]
/// domain = "ecs-main"
/// pid = "7"
/// org_abbr = "UNIA"
/// courses = ["12", "13"]
/// identity_fields = { ecs_PersonalUniqueCode = "idnumber" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Trust domain ID.
    pub domain: String,

    /// Participant id within the domain.
    pub pid: String,

    /// Organisation abbreviation.
    pub org_abbr: String,

    /// Whether users from this participant are accepted at all.
    #[serde(default = "default_true")]
    pub import_enabled: bool,

    /// Courses users from this participant may enter. `None` allows all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courses: Option<Vec<String>>,

    /// Person id type -> local account field used for matching.
    #[serde(default)]
    pub identity_fields: BTreeMap<String, String>,

    /// Local profile field -> external parameter. `None` uses the defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_fields: Option<BTreeMap<String, String>>,
}

fn default_true() -> bool {
    true
}

impl ParticipantConfig {
    /// Creates an enabled participant with default mappings.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        pid: impl Into<String>,
        org_abbr: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            pid: pid.into(),
            org_abbr: org_abbr.into(),
            import_enabled: true,
            courses: None,
            identity_fields: BTreeMap::new(),
            profile_fields: None,
        }
    }

    /// Builds the typed field mapping.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an identity field key is not a
    /// known person id type, or names a type that is never matched.
    pub fn field_mapping(&self) -> Result<FieldMapping, ConfigError> {
        let mut mapping = FieldMapping::new();
        if let Some(profile) = &self.profile_fields {
            mapping = mapping.with_profile_fields(profile.clone());
        }

        for (raw_kind, local_field) in &self.identity_fields {
            // Configuration loaders may lowercase map keys.
            let kind = PersonIdType::ALL
                .into_iter()
                .find(|kind| kind.as_param().eq_ignore_ascii_case(raw_kind))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "Participant {}: unknown person id type '{}'",
                        self.pid, raw_kind
                    ))
                })?;
            if kind.is_inherently_unique() {
                return Err(ConfigError::InvalidValue(format!(
                    "Participant {}: {} ids are never matched against accounts",
                    self.pid, kind
                )));
            }
            mapping = mapping.with_identity_field(kind, local_field.clone());
        }

        Ok(mapping)
    }
}

struct PolicyEntry {
    participant: Participant,
    import_enabled: bool,
    courses: Option<Vec<String>>,
}

/// A [`ParticipantDirectory`] backed by static configuration.
pub struct StaticParticipantDirectory {
    entries: HashMap<(String, String), PolicyEntry>,
}

impl StaticParticipantDirectory {
    /// Builds the directory from participant configurations.
    ///
    /// # Errors
    ///
    /// Returns an error if a participant's field mapping is invalid.
    pub fn new(participants: &[ParticipantConfig]) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();
        for config in participants {
            let participant = Participant {
                domain_id: config.domain.clone(),
                pid: config.pid.clone(),
                org_abbr: config.org_abbr.clone(),
                field_mapping: config.field_mapping()?,
            };
            entries.insert(
                (config.domain.clone(), config.pid.clone()),
                PolicyEntry {
                    participant,
                    import_enabled: config.import_enabled,
                    courses: config.courses.clone(),
                },
            );
        }
        Ok(Self { entries })
    }

    /// Builds the directory from the bridge configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a participant's field mapping is invalid.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Self::new(&config.participants)
    }

    /// Number of configured participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no participant is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ParticipantDirectory for StaticParticipantDirectory {
    async fn trust_policy(
        &self,
        domain: &TrustDomain,
        participant_id: &str,
        course_id: &str,
    ) -> AuthResult<TrustDecision> {
        let key = (domain.id.clone(), participant_id.to_string());
        let Some(entry) = self.entries.get(&key) else {
            return Ok(TrustDecision::Rejected(format!(
                "participant {} is not configured for domain {}",
                participant_id, domain.id
            )));
        };

        if !entry.import_enabled {
            return Ok(TrustDecision::Rejected(format!(
                "imports from participant {} are disabled",
                participant_id
            )));
        }

        if let Some(courses) = &entry.courses
            && !courses.iter().any(|c| c == course_id)
        {
            return Ok(TrustDecision::Rejected(format!(
                "participant {} may not access course {}",
                participant_id, course_id
            )));
        }

        Ok(TrustDecision::Trusted(entry.participant.clone()))
    }
}

//! Correlation storage.
//!
//! A correlation record ties an external person id to the local username it
//! was resolved to, together with every trust domain and participant the
//! person has arrived from. Records are never deleted by the bridge.

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::identity::person::{PersonId, PersonIdType};

/// A `(trust domain, source participant)` pair a person has arrived from.
///
/// Displayed as `{domain_id}_{participant_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainLink {
    /// Trust domain ID.
    pub domain_id: String,
    /// Source participant id within the domain.
    pub participant_id: String,
}

impl DomainLink {
    /// Creates a new link.
    #[must_use]
    pub fn new(domain_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

impl fmt::Display for DomainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.domain_id, self.participant_id)
    }
}

/// Persistent link between an external identity and a local username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    /// Local username. Unique across records.
    pub username: String,

    /// External person id value.
    pub external_id: String,

    /// External person id type.
    pub external_id_type: PersonIdType,

    /// Links this person has arrived from, in first-seen order. Only grows.
    pub known_domains: IndexSet<DomainLink>,

    /// Last course enrolment reported by the host.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_enrolled_at: Option<OffsetDateTime>,

    /// Whether the host has suspended the account.
    #[serde(default)]
    pub suspended: bool,

    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the record was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CorrelationRecord {
    /// Creates a record for a newly resolved identity.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        person_id: &PersonId,
        link: DomainLink,
        now: OffsetDateTime,
    ) -> Self {
        let mut known_domains = IndexSet::new();
        known_domains.insert(link);
        Self {
            username: username.into(),
            external_id: person_id.value.clone(),
            external_id_type: person_id.kind,
            known_domains,
            last_enrolled_at: None,
            suspended: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the external person id.
    #[must_use]
    pub fn person_id(&self) -> PersonId {
        PersonId::new(self.external_id_type, self.external_id.clone())
    }

    /// Returns `true` if the record belongs to `person_id`.
    #[must_use]
    pub fn is_for(&self, person_id: &PersonId) -> bool {
        self.external_id_type == person_id.kind && self.external_id == person_id.value
    }

    /// Adds a link. Returns `true` if it was not known before.
    pub fn add_domain(&mut self, link: DomainLink) -> bool {
        self.known_domains.insert(link)
    }

    /// Returns `true` if the link is already known.
    #[must_use]
    pub fn knows_domain(&self, link: &DomainLink) -> bool {
        self.known_domains.contains(link)
    }
}

/// Result of an atomic insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted,
    /// A record for the same external identity already exists.
    IdentityExists(CorrelationRecord),
    /// The username is already held by another record.
    UsernameTaken,
}

/// Result of recording a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationUpdate {
    /// The record after the update.
    pub record: CorrelationRecord,
    /// Whether the record was suspended before this authentication.
    pub reactivated: bool,
}

/// Correlation storage operations.
///
/// Implementations must guarantee at most one record per external identity
/// and per username, even under concurrent inserts.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Finds the record for an external person id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_external_id(&self, person_id: &PersonId) -> AuthResult<Option<CorrelationRecord>>;

    /// Finds the record holding a username.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<CorrelationRecord>>;

    /// Inserts a new record atomically.
    ///
    /// Conflicts are reported through [`InsertOutcome`], not as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert(&self, record: CorrelationRecord) -> AuthResult<InsertOutcome>;

    /// Records a successful authentication: adds `link` to the known domains
    /// and clears the suspended flag.
    ///
    /// Returns `None` if no record holds `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record_authentication(
        &self,
        username: &str,
        link: &DomainLink,
        now: OffsetDateTime,
    ) -> AuthResult<Option<AuthenticationUpdate>>;

    /// Records a course enrolment. Returns `false` if no record holds `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record_enrolment(&self, username: &str, now: OffsetDateTime) -> AuthResult<bool>;

    /// Sets the suspended flag. Returns `false` if no record holds `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_suspended(
        &self,
        username: &str,
        suspended: bool,
        now: OffsetDateTime,
    ) -> AuthResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_domain_link_display() {
        assert_eq!(DomainLink::new("ecs1", "7").to_string(), "ecs1_7");
    }

    #[test]
    fn test_known_domains_keep_insertion_order() {
        let now = datetime!(2026-01-01 0:00 UTC);
        let pid = PersonId::new(PersonIdType::Login, "jd");
        let mut record = CorrelationRecord::new("UNIA_jd", &pid, DomainLink::new("b", "2"), now);

        assert!(record.add_domain(DomainLink::new("a", "1")));
        assert!(!record.add_domain(DomainLink::new("b", "2")));

        let order: Vec<String> = record.known_domains.iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["b_2", "a_1"]);
        assert!(record.is_for(&pid));
        assert!(!record.is_for(&PersonId::new(PersonIdType::Uid, "jd")));
    }

    #[test]
    fn test_record_serialization() {
        let now = datetime!(2026-01-01 0:00 UTC);
        let pid = PersonId::new(PersonIdType::Eppn, "jd@uni-a.example");
        let record = CorrelationRecord::new("UNIA_jd", &pid, DomainLink::new("a", "1"), now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["external_id_type"], "ecs_ePPN");
        assert_eq!(json["created_at"], "2026-01-01T00:00:00Z");
        assert!(json.get("last_enrolled_at").is_none());

        let back: CorrelationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}

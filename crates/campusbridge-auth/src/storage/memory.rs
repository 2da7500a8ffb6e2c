//! In-memory storage backends.
//!
//! Backed by `DashMap` for concurrent access. Suitable for tests, the CLI's
//! replay command and single-process deployments without persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::account::{AccountDirectory, LocalAccount};
use super::correlation::{
    AuthenticationUpdate, CorrelationRecord, CorrelationStore, DomainLink, InsertOutcome,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::identity::person::PersonId;

/// In-memory [`CorrelationStore`].
///
/// Records are keyed by username, with a second index from external
/// identity to username. Inserts lock the identity entry first and the
/// username entry second; no other operation holds both.
#[derive(Debug, Default)]
pub struct InMemoryCorrelationStore {
    /// username -> record
    records: DashMap<String, CorrelationRecord>,
    /// external identity -> username
    identities: DashMap<PersonId, String>,
}

impl InMemoryCorrelationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a snapshot of all records, ordered by username.
    #[must_use]
    pub fn records(&self) -> Vec<CorrelationRecord> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        records
    }

    fn update<F>(&self, username: &str, now: OffsetDateTime, f: F) -> Option<CorrelationRecord>
    where
        F: FnOnce(&mut CorrelationRecord),
    {
        let mut record = self.records.get_mut(username)?;
        f(record.value_mut());
        record.updated_at = now;
        Some(record.clone())
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn find_by_external_id(&self, person_id: &PersonId) -> AuthResult<Option<CorrelationRecord>> {
        let Some(username) = self.identities.get(person_id).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        Ok(self.records.get(&username).map(|r| r.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<CorrelationRecord>> {
        Ok(self.records.get(username).map(|r| r.value().clone()))
    }

    async fn insert(&self, record: CorrelationRecord) -> AuthResult<InsertOutcome> {
        match self.identities.entry(record.person_id()) {
            Entry::Occupied(existing) => {
                let stored = self
                    .records
                    .get(existing.get())
                    .map(|r| r.value().clone())
                    .ok_or_else(|| {
                        AuthError::internal(format!(
                            "identity index points at missing record '{}'",
                            existing.get()
                        ))
                    })?;
                Ok(InsertOutcome::IdentityExists(stored))
            }
            Entry::Vacant(identity) => match self.records.entry(record.username.clone()) {
                Entry::Occupied(_) => Ok(InsertOutcome::UsernameTaken),
                Entry::Vacant(slot) => {
                    identity.insert(record.username.clone());
                    slot.insert(record);
                    Ok(InsertOutcome::Inserted)
                }
            },
        }
    }

    async fn record_authentication(
        &self,
        username: &str,
        link: &DomainLink,
        now: OffsetDateTime,
    ) -> AuthResult<Option<AuthenticationUpdate>> {
        let mut reactivated = false;
        let record = self.update(username, now, |record| {
            reactivated = record.suspended;
            record.suspended = false;
            record.add_domain(link.clone());
        });
        Ok(record.map(|record| AuthenticationUpdate {
            record,
            reactivated,
        }))
    }

    async fn record_enrolment(&self, username: &str, now: OffsetDateTime) -> AuthResult<bool> {
        Ok(self
            .update(username, now, |record| record.last_enrolled_at = Some(now))
            .is_some())
    }

    async fn set_suspended(
        &self,
        username: &str,
        suspended: bool,
        now: OffsetDateTime,
    ) -> AuthResult<bool> {
        Ok(self
            .update(username, now, |record| record.suspended = suspended)
            .is_some())
    }
}

/// In-memory [`AccountDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: DashMap<String, LocalAccount>,
}

impl InMemoryAccountDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory seeded with accounts.
    #[must_use]
    pub fn with_accounts(accounts: impl IntoIterator<Item = LocalAccount>) -> Self {
        let directory = Self::new();
        for account in accounts {
            directory.add_account(account);
        }
        directory
    }

    /// Adds or replaces an account.
    pub fn add_account(&self, account: LocalAccount) {
        self.accounts.insert(account.username.clone(), account);
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no account exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_accounts_by_field(&self, field: &str, value: &str) -> AuthResult<Vec<LocalAccount>> {
        let mut matches: Vec<_> = self
            .accounts
            .iter()
            .filter(|a| a.fields.get(field).is_some_and(|v| v == value))
            .map(|a| a.value().clone())
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(matches)
    }

    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        Ok(self.accounts.contains_key(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::macros::datetime;

    use crate::identity::person::PersonIdType;

    const NOW: OffsetDateTime = datetime!(2026-02-01 8:00 UTC);

    fn record(username: &str, login: &str) -> CorrelationRecord {
        CorrelationRecord::new(
            username,
            &PersonId::new(PersonIdType::Login, login),
            DomainLink::new("a", "1"),
            NOW,
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryCorrelationStore::new();
        assert_eq!(
            store.insert(record("UNIA_jd", "jd")).await.unwrap(),
            InsertOutcome::Inserted
        );

        let by_id = store
            .find_by_external_id(&PersonId::new(PersonIdType::Login, "jd"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.username, "UNIA_jd");
        assert!(store.find_by_username("UNIA_jd").await.unwrap().is_some());
        assert!(store.find_by_username("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_conflicts() {
        let store = InMemoryCorrelationStore::new();
        store.insert(record("UNIA_jd", "jd")).await.unwrap();

        match store.insert(record("UNIA_jd1", "jd")).await.unwrap() {
            InsertOutcome::IdentityExists(existing) => assert_eq!(existing.username, "UNIA_jd"),
            other => panic!("expected identity conflict, got {other:?}"),
        }
        assert_eq!(
            store.insert(record("UNIA_jd", "someone-else")).await.unwrap(),
            InsertOutcome::UsernameTaken
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_one_record() {
        let store = Arc::new(InMemoryCorrelationStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(record(&format!("user{i}"), "jd")).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_record_authentication_reactivates() {
        let store = InMemoryCorrelationStore::new();
        store.insert(record("UNIA_jd", "jd")).await.unwrap();
        assert!(store.set_suspended("UNIA_jd", true, NOW).await.unwrap());

        let later = datetime!(2026-02-02 8:00 UTC);
        let update = store
            .record_authentication("UNIA_jd", &DomainLink::new("b", "2"), later)
            .await
            .unwrap()
            .unwrap();
        assert!(update.reactivated);
        assert!(!update.record.suspended);
        assert_eq!(update.record.known_domains.len(), 2);
        assert_eq!(update.record.updated_at, later);

        let again = store
            .record_authentication("UNIA_jd", &DomainLink::new("b", "2"), later)
            .await
            .unwrap()
            .unwrap();
        assert!(!again.reactivated);
        assert_eq!(again.record.known_domains.len(), 2);

        assert!(
            store
                .record_authentication("missing", &DomainLink::new("b", "2"), later)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_record_enrolment() {
        let store = InMemoryCorrelationStore::new();
        store.insert(record("UNIA_jd", "jd")).await.unwrap();

        assert!(store.record_enrolment("UNIA_jd", NOW).await.unwrap());
        assert!(!store.record_enrolment("missing", NOW).await.unwrap());
        let stored = store.find_by_username("UNIA_jd").await.unwrap().unwrap();
        assert_eq!(stored.last_enrolled_at, Some(NOW));
    }

    #[tokio::test]
    async fn test_account_directory() {
        let directory = InMemoryAccountDirectory::with_accounts([
            LocalAccount::new("bob").with_field("idnumber", "42"),
            LocalAccount::new("alice").with_field("idnumber", "42"),
            LocalAccount::new("carol").with_field("idnumber", "7"),
        ]);

        let found = directory.find_accounts_by_field("idnumber", "42").await.unwrap();
        let names: Vec<_> = found.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(directory.find_accounts_by_field("email", "42").await.unwrap().is_empty());
        assert!(directory.username_exists("carol").await.unwrap());
        assert!(!directory.username_exists("dave").await.unwrap());
    }
}

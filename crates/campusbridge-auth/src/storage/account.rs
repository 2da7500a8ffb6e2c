//! Local account lookup.
//!
//! The bridge never creates accounts itself. It only asks the host which
//! accounts exist, to match existing users and to avoid username clashes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;

/// A local account as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    /// Login name.
    pub username: String,

    /// Profile fields usable for identity matching, e.g. `idnumber`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl LocalAccount {
    /// Creates an account without fields.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets a profile field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Read access to the host's accounts.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Finds all accounts whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_accounts_by_field(&self, field: &str, value: &str) -> AuthResult<Vec<LocalAccount>>;

    /// Returns `true` if an account with this username exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn username_exists(&self, username: &str) -> AuthResult<bool>;
}

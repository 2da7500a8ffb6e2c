//! Trust domain configuration.
//!
//! A trust domain is one configured connection to an exchange service (ECS)
//! instance. The core never modifies trust domains; they are created and
//! edited through configuration only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A configured connection to one exchange service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustDomain {
    /// Unique identifier of this trust domain.
    pub id: String,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Base URL of the exchange service, e.g. `https://ecs.example.org/ecs`.
    pub base_url: String,

    /// Role the caller should assign to users imported through this domain.
    #[serde(default = "default_import_role")]
    pub import_role: String,

    /// How long imported accounts stay active without a new login.
    /// Consumed by host maintenance jobs.
    #[serde(default = "default_import_period_months")]
    pub import_period_months: u32,

    /// Accounts to notify when this domain cannot be reached.
    #[serde(default)]
    pub notify_usernames: BTreeSet<String>,

    /// Disabled domains are never consulted.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_import_role() -> String {
    "student".to_string()
}

fn default_import_period_months() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

impl TrustDomain {
    /// Creates a new enabled trust domain with default import settings.
    #[must_use]
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            base_url: base_url.into(),
            import_role: default_import_role(),
            import_period_months: default_import_period_months(),
            notify_usernames: BTreeSet::new(),
            enabled: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the import role.
    #[must_use]
    pub fn with_import_role(mut self, role: impl Into<String>) -> Self {
        self.import_role = role.into();
        self
    }

    /// Adds an account to notify about connection problems.
    #[must_use]
    pub fn with_notify_username(mut self, username: impl Into<String>) -> Self {
        self.notify_usernames.insert(username.into());
        self
    }

    /// Sets whether the domain is enabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the display name, falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

//! Fault notification.
//!
//! When every consulted trust domain fails at the transport layer the
//! administrators listed in those domains' `notify_usernames` are told.
//! Delivery is up to the host; [`TracingFaultNotifier`] only logs.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::federation::verifier::DomainFailure;

/// A single failing trust domain within a [`FaultReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainFault {
    /// Trust domain ID.
    pub domain_id: String,
    /// The domain's display name.
    pub domain_name: String,
    /// What went wrong.
    pub error: String,
}

/// Report of an exchange outage affecting a course link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultReport {
    /// Usernames to notify: the union over all failing domains.
    pub recipients: BTreeSet<String>,

    /// The failing domains, in consultation order.
    pub failures: Vec<DomainFault>,

    /// The course the user tried to enter.
    pub course_id: String,

    /// When the fault was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl FaultReport {
    /// Builds a report from the verifier's transport failures.
    #[must_use]
    pub fn new(failures: &[DomainFailure], course_id: impl Into<String>, occurred_at: OffsetDateTime) -> Self {
        let recipients = failures
            .iter()
            .flat_map(|f| f.domain.notify_usernames.iter().cloned())
            .collect();
        let failures = failures
            .iter()
            .map(|f| DomainFault {
                domain_id: f.domain.id.clone(),
                domain_name: f.domain.display_name().to_string(),
                error: f.error.to_string(),
            })
            .collect();

        Self {
            recipients,
            failures,
            course_id: course_id.into(),
            occurred_at,
        }
    }

    /// IDs of the failing domains.
    #[must_use]
    pub fn domain_ids(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.domain_id.clone()).collect()
    }
}

/// Delivers fault reports to administrators.
#[async_trait]
pub trait FaultNotifier: Send + Sync {
    /// Delivers a report.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. The caller logs it and carries on.
    async fn notify(&self, report: &FaultReport) -> AuthResult<()>;
}

/// A [`FaultNotifier`] that writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultNotifier;

#[async_trait]
impl FaultNotifier for TracingFaultNotifier {
    async fn notify(&self, report: &FaultReport) -> AuthResult<()> {
        let recipients: Vec<&str> = report.recipients.iter().map(String::as_str).collect();
        tracing::error!(
            course = %report.course_id,
            domains = ?report.domain_ids(),
            recipients = ?recipients,
            "Exchange service unavailable for all trust domains"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    use crate::federation::domain::TrustDomain;
    use crate::federation::transport::TransportError;

    #[test]
    fn test_recipients_are_union_of_failing_domains() {
        let failures = vec![
            DomainFailure {
                domain: TrustDomain::new("a", "https://ecs-a.example.org")
                    .with_notify_username("admin")
                    .with_notify_username("ops"),
                error: TransportError::Connection("refused".to_string()),
            },
            DomainFailure {
                domain: TrustDomain::new("b", "https://ecs-b.example.org")
                    .with_name("ECS B")
                    .with_notify_username("admin"),
                error: TransportError::Protocol("bad json".to_string()),
            },
        ];

        let report = FaultReport::new(&failures, "12", datetime!(2026-01-01 0:00 UTC));

        assert_eq!(
            report.recipients.iter().collect::<Vec<_>>(),
            vec!["admin", "ops"]
        );
        assert_eq!(report.domain_ids(), vec!["a", "b"]);
        assert_eq!(report.failures[1].domain_name, "ECS B");
        assert_eq!(report.failures[1].error, "Protocol error: bad json");
    }

    #[tokio::test]
    async fn test_tracing_notifier_succeeds() {
        let report = FaultReport::new(&[], "1", datetime!(2026-01-01 0:00 UTC));
        assert!(TracingFaultNotifier.notify(&report).await.is_ok());
    }
}

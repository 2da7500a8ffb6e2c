use std::sync::Arc;

use anyhow::{Context, Result};
use campusbridge_auth::{
    AuthOutcome, CorrelationRecord, InMemoryAccountDirectory, InMemoryCorrelationStore,
    LinkAuthenticator,
};
use colored::Colorize;
use serde_json::json;
use time::OffsetDateTime;

use crate::cli::{OutputFormat, ReplayArgs};
use crate::config::AppConfig;
use crate::fixtures::{FixtureVerifier, load_accounts};
use crate::output::{print_error, print_fields, print_json, print_section, print_success, print_table};

/// Result of a replay, ready for printing.
pub struct Replay {
    pub outcome: Result<AuthOutcome, campusbridge_auth::AuthError>,
    pub records: Vec<CorrelationRecord>,
    pub at: OffsetDateTime,
}

/// Runs the URL through the full pipeline with recorded claims and
/// in-memory storage.
pub async fn run_replay(config: &AppConfig, args: &ReplayArgs) -> Result<Replay> {
    let tokens = Arc::new(FixtureVerifier::from_file(&args.claims)?);
    let accounts = match &args.accounts {
        Some(path) => load_accounts(path)?,
        None => Vec::new(),
    };
    let correlations = Arc::new(InMemoryCorrelationStore::new());

    let authenticator = LinkAuthenticator::builder(config.bridge())
        .token_verifier(tokens)
        .correlation_store(correlations.clone())
        .account_directory(Arc::new(InMemoryAccountDirectory::with_accounts(accounts)))
        .build()
        .context("building authenticator")?;

    let at = args.at.unwrap_or_else(OffsetDateTime::now_utc);
    let outcome = authenticator.authenticate_at(&args.url, at).await;

    Ok(Replay {
        outcome,
        records: correlations.records(),
        at,
    })
}

pub async fn replay(config: &AppConfig, args: &ReplayArgs, format: OutputFormat) -> Result<()> {
    let Replay {
        outcome,
        records,
        at,
    } = run_replay(config, args).await?;

    if matches!(format, OutputFormat::Json) {
        let outcome = match &outcome {
            Ok(outcome) => json!(outcome),
            Err(e) => json!({ "status": "error", "category": e.category().to_string(), "detail": e.to_string() }),
        };
        return print_json(&json!({ "outcome": outcome, "correlations": records }));
    }

    println!("{}: {}", "Evaluated at".cyan(), at);
    match &outcome {
        Ok(AuthOutcome::Authenticated(identity)) => {
            print_success(&format!("Authenticated as {}", identity.username.green()));
            print_fields(vec![
                ("Action", identity.action.to_string()),
                ("Domain", identity.origin_domain_id.clone()),
                ("Participant", identity.source_participant_id.clone()),
                ("Role", identity.requested_role.clone()),
                ("Reactivated", identity.reactivated.to_string()),
            ]);
            if !identity.local_profile_fields.is_empty() {
                print_section("Profile");
                let rows = identity
                    .local_profile_fields
                    .iter()
                    .map(|(k, v)| [k.clone(), v.clone()])
                    .collect();
                print_table(["Field", "Value"], rows);
            }
        }
        Ok(AuthOutcome::NotApplicable(reason)) => {
            println!("{} not a course link with token ({reason})", "-".yellow());
        }
        Ok(AuthOutcome::Rejected(rejection)) => print_error(&format!("Rejected: {rejection}")),
        Err(e) => print_error(&format!("{} error: {e}", e.category())),
    }

    if !records.is_empty() {
        print_section("Correlations");
        let rows = records
            .iter()
            .map(|r| {
                [
                    r.username.clone(),
                    format!("{}={}", r.external_id_type, r.external_id),
                    r.known_domains
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                ]
            })
            .collect();
        print_table(["Username", "External id", "Known domains"], rows);
    }
    Ok(())
}

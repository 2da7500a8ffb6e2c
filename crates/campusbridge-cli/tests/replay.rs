//! Offline replay of course links against recorded exchange answers.

use campusbridge_auth::federation::participant::ParticipantConfig;
use campusbridge_auth::{AuthOutcome, ResolutionAction, TrustDomain};
use campusbridge_cli::cli::ReplayArgs;
use campusbridge_cli::commands::replay::run_replay;
use campusbridge_cli::config::AppConfig;
use tempfile::TempDir;

const URL: &str = "https://lms.example.edu/course/view.php?id=5&ecs_login=jd&ecs_hash=tok";

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.site.base_url = "https://lms.example.edu".to_string();
    config.domains = vec![
        TrustDomain::new("ecs1", "https://ecs.example.org/ecs"),
        TrustDomain::new("ecs2", "https://ecs2.example.org/ecs"),
    ];
    config.participants = vec![ParticipantConfig::new("ecs1", "10", "UNIA")];
    config
}

fn args(dir: &TempDir, claims: &str, accounts: Option<&str>) -> ReplayArgs {
    let claims_path = dir.path().join("claims.json");
    std::fs::write(&claims_path, claims).unwrap();
    let accounts = accounts.map(|content| {
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    });
    ReplayArgs {
        url: URL.to_string(),
        claims: claims_path.to_string_lossy().into_owned(),
        accounts,
        at: None,
    }
}

#[tokio::test]
async fn test_replay_creates_identity() {
    let dir = TempDir::new().unwrap();
    let args = args(
        &dir,
        r#"{ "ecs1": { "token_hash": "tok", "issuer_participant_id": "10", "source_participant_id": "10" } }"#,
        None,
    );

    let replay = run_replay(&config(), &args).await.unwrap();
    let outcome = replay.outcome.unwrap();
    let identity = outcome.identity().unwrap();
    assert_eq!(identity.username, "UNIA_jd");
    assert_eq!(identity.action, ResolutionAction::Created);
    assert_eq!(replay.records.len(), 1);
    assert_eq!(replay.records[0].username, "UNIA_jd");
}

#[tokio::test]
async fn test_replay_avoids_existing_username() {
    let dir = TempDir::new().unwrap();
    let args = args(
        &dir,
        r#"{ "ecs1": { "token_hash": "tok", "issuer_participant_id": "10", "source_participant_id": "10" } }"#,
        Some(r#"[{ "username": "UNIA_jd" }]"#),
    );

    let replay = run_replay(&config(), &args).await.unwrap();
    assert_eq!(replay.outcome.unwrap().identity().unwrap().username, "UNIA_jd1");
}

#[tokio::test]
async fn test_replay_unknown_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let args = args(&dir, r#"{ "ecs1": null }"#, None);

    let replay = run_replay(&config(), &args).await.unwrap();
    assert!(matches!(replay.outcome, Ok(AuthOutcome::Rejected(_))));
    assert!(replay.records.is_empty());
}

#[tokio::test]
async fn test_replay_transport_failure_is_error() {
    let dir = TempDir::new().unwrap();
    let args = args(
        &dir,
        r#"{ "ecs1": { "transport_error": "connection refused" }, "ecs2": null }"#,
        None,
    );

    let replay = run_replay(&config(), &args).await.unwrap();
    let err = replay.outcome.unwrap_err();
    assert!(err.is_exchange_error());
}

#[tokio::test]
async fn test_replay_missing_claims_file() {
    let args = ReplayArgs {
        url: URL.to_string(),
        claims: "/nonexistent/claims.json".to_string(),
        accounts: None,
        at: None,
    };
    assert!(run_replay(&config(), &args).await.is_err());
}

//! Loading configuration files and environment overrides.

use std::io::Write;
use std::time::Duration;

use campusbridge_auth::PersonIdType;
use campusbridge_cli::config::{ConfigSource, loader};
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[logging]
level = "debug"

[site]
base_url = "https://lms.example.edu"

[verification]
clock_skew_tolerance = "30s"
request_timeout = "2s"

[[domains]]
id = "ecs1"
name = "Main exchange"
base_url = "https://ecs.example.org/ecs"
import_role = "guest"
notify_usernames = ["admin"]

[[domains]]
id = "ecs2"
base_url = "https://ecs2.example.org"
enabled = false

[[participants]]
domain = "ecs1"
pid = "10"
org_abbr = "UNIA"
courses = ["5", "6"]
identity_fields = { ecs_PersonalUniqueCode = "idnumber" }
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

#[test]
fn test_load_full_config() {
    let file = write_config(CONFIG);
    let config = loader::load_config(&path_of(&file), ConfigSource::CliArgument).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.site.base_url, "https://lms.example.edu");
    assert_eq!(config.verification.clock_skew_tolerance, Duration::from_secs(30));
    assert_eq!(config.verification.request_timeout, Duration::from_secs(2));

    assert_eq!(config.domains.len(), 2);
    let main = &config.domains[0];
    assert_eq!(main.display_name(), "Main exchange");
    assert_eq!(main.import_role, "guest");
    assert!(main.notify_usernames.contains("admin"));
    assert!(main.enabled);
    assert_eq!(config.domains[1].import_role, "student");
    assert!(!config.domains[1].enabled);

    let participant = &config.participants[0];
    assert_eq!(participant.courses.as_deref(), Some(&["5".to_string(), "6".to_string()][..]));
    let mapping = participant.field_mapping().unwrap();
    assert_eq!(
        mapping.identity_field(PersonIdType::PersonalUniqueCode),
        Some("idnumber")
    );
}

#[test]
fn test_environment_overrides_file() {
    let file = write_config(CONFIG);
    // SAFETY: only this test touches the variable.
    unsafe { std::env::set_var("CAMPUSBRIDGE__USERNAMES__MAX_ATTEMPTS", "25") };
    let result = loader::load_config(&path_of(&file), ConfigSource::CliArgument);
    unsafe { std::env::remove_var("CAMPUSBRIDGE__USERNAMES__MAX_ATTEMPTS") };

    assert_eq!(result.unwrap().usernames.max_attempts, 25);
}

#[test]
fn test_missing_default_file_uses_defaults() {
    let config = loader::load_config("/nonexistent/campusbridge.toml", ConfigSource::Default).unwrap();
    assert!(config.domains.is_empty());
    assert_eq!(config.verification.request_timeout, Duration::from_secs(10));
}

#[test]
fn test_participant_with_unknown_domain_is_rejected() {
    let file = write_config(
        r#"
[site]
base_url = "https://lms.example.edu"

[[participants]]
domain = "nowhere"
pid = "1"
org_abbr = "X"
"#,
    );
    let err = loader::load_config(&path_of(&file), ConfigSource::CliArgument).unwrap_err();
    assert!(format!("{err:#}").contains("nowhere"));
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let file = write_config("[logging]\nlevel = \"chatty\"\n");
    assert!(loader::load_config(&path_of(&file), ConfigSource::CliArgument).is_err());
}

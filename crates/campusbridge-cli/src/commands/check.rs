use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::cli::{CheckArgs, OutputFormat};
use crate::config::{AppConfig, ConfigSource};
use crate::output::{print_json, print_section, print_success, print_table, print_warning};

pub fn check(
    config: &AppConfig,
    path: &str,
    source: ConfigSource,
    args: &CheckArgs,
    format: OutputFormat,
) -> Result<()> {
    if args.show {
        println!("{}", toml::to_string_pretty(config)?);
        return Ok(());
    }

    if matches!(format, OutputFormat::Json) {
        return print_json(&json!({
            "valid": true,
            "path": path,
            "source": source.to_string(),
            "site": config.site.base_url,
            "domains": config.domains,
            "participants": config.participants,
        }));
    }

    print_success(&format!("Configuration valid: {} ({})", path, source));
    println!("{}: {}", "Site".cyan(), config.site.base_url);

    print_section("Trust domains");
    let rows = config
        .domains
        .iter()
        .map(|d| {
            [
                d.id.clone(),
                d.display_name().to_string(),
                d.base_url.clone(),
                d.import_role.clone(),
                if d.enabled { "yes".green() } else { "no".red() }.to_string(),
                d.notify_usernames.iter().cloned().collect::<Vec<_>>().join(", "),
            ]
        })
        .collect();
    print_table(["ID", "Name", "Base URL", "Role", "Enabled", "Notify"], rows);

    print_section("Participants");
    let rows = config
        .participants
        .iter()
        .map(|p| {
            [
                p.domain.clone(),
                p.pid.clone(),
                p.org_abbr.clone(),
                if p.import_enabled { "yes" } else { "no" }.to_string(),
                p.courses
                    .as_ref()
                    .map_or_else(|| "all".to_string(), |c| c.join(", ")),
                p.identity_fields
                    .iter()
                    .map(|(kind, field)| format!("{kind} -> {field}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();
    print_table(
        ["Domain", "PID", "Org", "Import", "Courses", "Identity fields"],
        rows,
    );

    if config.domains.iter().all(|d| !d.enabled) {
        print_warning("No enabled trust domain; every course link will be unverified");
    }
    Ok(())
}

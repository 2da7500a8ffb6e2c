use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Parser)]
#[command(name = "campusbridge")]
#[command(about = "CampusBridge CLI: check configuration and replay CampusConnect course links")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (overrides CAMPUSBRIDGE_CONFIG and campusbridge.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Check(CheckArgs),
    /// Analyse a course link offline
    Inspect(InspectArgs),
    /// Run a course link through the full pipeline against recorded claims
    Replay(ReplayArgs),
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Print the effective configuration as TOML
    #[arg(long)]
    pub show: bool,
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Destination URL as received
    pub url: String,
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Destination URL as received
    pub url: String,
    /// JSON file mapping trust domain IDs to recorded claims
    #[arg(long)]
    pub claims: String,
    /// JSON file with local accounts to seed
    #[arg(long)]
    pub accounts: Option<String>,
    /// Evaluate validity windows at this RFC 3339 instant instead of now
    #[arg(long, value_parser = parse_rfc3339)]
    pub at: Option<OffsetDateTime>,
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

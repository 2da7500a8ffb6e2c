use anyhow::Result;
use clap::Parser;

use campusbridge_cli::cli::{Cli, Commands};
use campusbridge_cli::config::{loader, resolve_config_path};
use campusbridge_cli::output::print_error;
use campusbridge_cli::{commands, observability};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let (path, source) = resolve_config_path(cli.config.as_deref());
    let config = loader::load_config(&path, source)?;
    observability::apply_logging_level(&config.logging.level);
    tracing::debug!(path = %path, source = %source, "Configuration loaded");

    match &cli.command {
        Commands::Check(args) => commands::check::check(&config, &path, source, args, format)?,
        Commands::Inspect(args) => commands::inspect::inspect(&config, &args.url, format)?,
        Commands::Replay(args) => commands::replay::replay(&config, args, format).await?,
    }

    Ok(())
}

//! Application configuration for the CLI.
//!
//! Wraps the library's [`BridgeConfig`] sections together with logging
//! settings and loads them from a TOML file plus environment overrides.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use campusbridge_auth::config::{SiteConfig, UsernameConfig, VerificationConfig};
use campusbridge_auth::federation::participant::ParticipantConfig;
use campusbridge_auth::{BridgeConfig, TrustDomain};
use serde::{Deserialize, Serialize};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "campusbridge.toml";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CAMPUSBRIDGE_CONFIG";

/// Prefix of environment overrides, e.g. `CAMPUSBRIDGE__SITE__BASE_URL`.
pub const ENV_PREFIX: &str = "CAMPUSBRIDGE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub site: SiteConfig,
    pub verification: VerificationConfig,
    pub usernames: UsernameConfig,
    pub domains: Vec<TrustDomain>,
    pub participants: Vec<ParticipantConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            bail!("logging.level must be one of {valid_levels:?}");
        }
        self.bridge().validate()?;
        Ok(())
    }

    /// The library configuration.
    pub fn bridge(&self) -> BridgeConfig {
        BridgeConfig {
            site: self.site.clone(),
            verification: self.verification.clone(),
            usernames: self.usernames.clone(),
            domains: self.domains.clone(),
            participants: self.participants.clone(),
        }
    }
}

/// Where the configuration path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From CAMPUSBRIDGE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (campusbridge.toml)
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable ({CONFIG_PATH_ENV})"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Resolves the configuration path: CLI argument, then environment, then default.
pub fn resolve_config_path(cli_path: Option<&str>) -> (String, ConfigSource) {
    if let Some(path) = cli_path {
        return (path.to_string(), ConfigSource::CliArgument);
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }
    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}

pub mod loader {
    use super::*;
    use config::{Config, Environment, File};

    /// Loads and validates the configuration.
    ///
    /// A missing file is an error only when it was named explicitly.
    pub fn load_config(path: &str, source: ConfigSource) -> Result<AppConfig> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path);
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if source != ConfigSource::Default {
            bail!("configuration file '{path}' not found ({source})");
        }
        // Environment variable overrides, e.g., CAMPUSBRIDGE__SITE__BASE_URL=https://lms.example.edu
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder.build().context("config build error")?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .context("config deserialize error")?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let (path, source) = resolve_config_path(Some("/etc/campusbridge.toml"));
        assert_eq!(path, "/etc/campusbridge.toml");
        assert_eq!(source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = loader::load_config("/nonexistent/campusbridge.toml", ConfigSource::CliArgument);
        assert!(result.is_err());
    }
}

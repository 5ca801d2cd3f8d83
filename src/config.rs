//! Configuration file support for zephyr-migrate.
//!
//! Configuration is loaded from TOML with the following search order:
//! 1. Path specified via `--config`
//! 2. `./zephyr-migrate.toml` (current directory)
//!
//! The `[commands]` table has no defaults and must always be present.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use zephyr_shared::BackoffPolicy;

use crate::command_ids::CommandIds;

/// File name looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "zephyr-migrate.toml";

/// Top-level configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub whitelists: WhitelistConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    pub commands: CommandIds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command queue connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Credential profile holding the write account
    pub profile: String,
    /// MySQL port
    pub port: u16,
    /// SQLite URL used instead of MySQL (dry runs)
    pub sqlite_url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            profile: "dbPOD_write".into(),
            port: 3306,
            sqlite_url: None,
        }
    }
}

/// Where credentials are read from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("credentials.toml"),
        }
    }
}

/// Whitelist file locations, re-read for every device.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    pub apn: PathBuf,
    pub server: PathBuf,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            apn: PathBuf::from("apn_whitelist.txt"),
            server: PathBuf::from("server_whitelist.txt"),
        }
    }
}

/// Poll interval growth for response waits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_interval_secs: u64,
    pub increment_secs: u64,
    pub patience: u64,
    pub max_interval_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            initial_interval_secs: policy.initial_interval_secs,
            increment_secs: policy.increment_secs,
            patience: policy.patience,
            max_interval_secs: policy.max_interval_secs,
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        BackoffPolicy {
            initial_interval_secs: config.initial_interval_secs,
            increment_secs: config.increment_secs,
            patience: config.patience,
            max_interval_secs: config.max_interval_secs,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Log file, opened for append
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: Some(PathBuf::from("log.txt")),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default file when none is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    bail!(
                        "No configuration found: pass --config or create ./{}",
                        DEFAULT_CONFIG_FILE
                    );
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let backoff = &self.backoff;
        if backoff.patience == 0 {
            bail!("backoff.patience must be at least 1");
        }
        if backoff.initial_interval_secs == 0 {
            bail!("backoff.initial_interval_secs must be at least 1");
        }
        if backoff.increment_secs == 0 {
            bail!("backoff.increment_secs must be at least 1");
        }
        if backoff.initial_interval_secs > backoff.max_interval_secs {
            bail!(
                "backoff.initial_interval_secs ({}) exceeds backoff.max_interval_secs ({})",
                backoff.initial_interval_secs,
                backoff.max_interval_secs
            );
        }
        Ok(())
    }
}

/// Read serial numbers from a device list, one per line; `#` starts a comment
pub fn load_device_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read device list {}", path.display()))?;

    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

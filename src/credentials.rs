//! Database credential source
//!
//! Credentials live in a TOML file of named profiles:
//!
//! ```toml
//! [dbPOD_write]
//! user = "writer"
//! password = "..."
//! host = "db.internal"
//! db = "dbPOD"
//! ```
//!
//! `ZEPHYR_DB_USER`, `ZEPHYR_DB_PASSWORD`, `ZEPHYR_DB_HOST` and `ZEPHYR_DB_NAME`
//! override the matching field of whichever profile is loaded.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use zephyr_shared::store::MySqlCredentials;

/// Something that can hand out credentials for a named profile
pub trait CredentialSource {
    fn credentials(&self, profile: &str) -> Result<DatabaseCredentials>;
}

/// Login details for one database account
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    #[serde(rename = "db")]
    pub database: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseCredentials {
    /// Combine with a port into MySQL connection parameters
    pub fn into_mysql(self, port: u16) -> MySqlCredentials {
        MySqlCredentials {
            user: self.user,
            password: self.password,
            host: self.host,
            database: self.database,
            port,
        }
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(user) = lookup("ZEPHYR_DB_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("ZEPHYR_DB_PASSWORD") {
            self.password = password;
        }
        if let Some(host) = lookup("ZEPHYR_DB_HOST") {
            self.host = host;
        }
        if let Some(database) = lookup("ZEPHYR_DB_NAME") {
            self.database = database;
        }
        self
    }
}

/// Profiles loaded from a credential file
#[derive(Debug, Clone, Default)]
pub struct CredentialFile {
    profiles: HashMap<String, DatabaseCredentials>,
}

impl CredentialFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid credentials {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let profiles = toml::from_str(text)?;
        Ok(Self { profiles })
    }

    fn profile(&self, profile: &str) -> Result<DatabaseCredentials> {
        self.profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| anyhow!("No credential profile named {}", profile))
    }
}

impl CredentialSource for CredentialFile {
    fn credentials(&self, profile: &str) -> Result<DatabaseCredentials> {
        Ok(self
            .profile(profile)?
            .apply_overrides(|key| std::env::var(key).ok()))
    }
}

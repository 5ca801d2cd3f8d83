//! APN and server whitelists
//!
//! Both files are colon separated, one entry per line:
//!
//! ```text
//! # apn_whitelist.txt:    <apn-and-password>:<set-apn-command>
//! "iot.net","user","pass":31
//!
//! # server_whitelist.txt: <server>:<set-main-command>:<set-alt-command>
//! main.example.com:42:43
//! aq76.example.com:44:-
//! ```
//!
//! A server field that is not a number means that server cannot be set in
//! that role.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhitelistError {
    #[error("Failed to read whitelist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Whitelist line {line_no} has no command id: {line:?}")]
    MissingCommandId { line_no: usize, line: String },

    #[error("Whitelist line {line_no} has invalid command id {value:?}")]
    InvalidCommandId { line_no: usize, value: String },
}

/// Which of the two connection slots a server setting applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    Main,
    Alt,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Main => write!(f, "main"),
            ServerRole::Alt => write!(f, "alt"),
        }
    }
}

fn read(path: &Path) -> Result<String, WhitelistError> {
    std::fs::read_to_string(path).map_err(|source| WhitelistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Accepted APN/password strings and the command that sets each one
#[derive(Debug, Clone, Default)]
pub struct ApnWhitelist {
    entries: HashMap<String, i64>,
}

impl ApnWhitelist {
    pub fn load(path: &Path) -> Result<Self, WhitelistError> {
        Self::parse(&read(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, WhitelistError> {
        let mut entries = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let mut parts = line.split(':');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().ok_or_else(|| WhitelistError::MissingCommandId {
                line_no,
                line: line.to_string(),
            })?;
            let command_id = value
                .trim()
                .parse::<i64>()
                .map_err(|_| WhitelistError::InvalidCommandId {
                    line_no,
                    value: value.to_string(),
                })?;
            entries.insert(key.to_string(), command_id);
        }

        Ok(Self { entries })
    }

    pub fn contains(&self, apn: &str) -> bool {
        self.entries.contains_key(apn)
    }

    /// Command that sets `apn`, if it is whitelisted
    pub fn command_for(&self, apn: &str) -> Option<i64> {
        self.entries.get(apn).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Commands that point a unit at a whitelisted server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerCommands {
    pub main: Option<i64>,
    pub alt: Option<i64>,
}

impl ServerCommands {
    pub fn for_role(&self, role: ServerRole) -> Option<i64> {
        match role {
            ServerRole::Main => self.main,
            ServerRole::Alt => self.alt,
        }
    }
}

/// Accepted servers and how to select each in either role
#[derive(Debug, Clone, Default)]
pub struct ServerWhitelist {
    entries: HashMap<String, ServerCommands>,
}

impl ServerWhitelist {
    pub fn load(path: &Path) -> Result<Self, WhitelistError> {
        Ok(Self::parse(&read(path)?))
    }

    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut parts = line.split(':');
                let key = parts.next().unwrap_or_default().to_string();
                let mut command = || parts.next().and_then(|v| v.trim().parse::<i64>().ok());
                let main = command();
                let alt = command();
                (key, ServerCommands { main, alt })
            })
            .collect();

        Self { entries }
    }

    pub fn contains(&self, server: &str) -> bool {
        self.entries.contains_key(server)
    }

    pub fn get(&self, server: &str) -> Option<ServerCommands> {
        self.entries.get(server).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

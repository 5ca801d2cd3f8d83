//! Per-device migration workflow
//!
//! This module handles:
//! - Reading a unit's legacy and new-style connection settings
//! - Checking the new settings against the whitelists
//! - Queueing set commands derived from the legacy settings where needed
//! - Running one task per unit over a shared poller

mod device;
mod runner;
#[cfg(test)]
mod testing;

pub use device::migrate_device;
pub use runner::run;

use thiserror::Error;
use zephyr_shared::{AdaptivePoller, CommandError, PendingCommandId};

use crate::command_ids::CommandIds;
use crate::config::WhitelistConfig;
use crate::whitelist::{ServerRole, WhitelistError};

/// Everything a device task needs, built once at startup and shared
pub struct MigrationContext<S> {
    pub poller: AdaptivePoller<S>,
    pub commands: CommandIds,
    pub whitelists: WhitelistConfig,
}

/// Reasons a single unit could not be migrated
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Old APN for {serial} is {command}, not formatted correctly")]
    ApnFormatting { serial: String, command: String },

    #[error("Old APN for {serial} is {apn}, not in APN whitelist")]
    ApnWhitelist { serial: String, apn: String },

    #[error("Old {role} server for {serial} is {command}, not formatted correctly")]
    ServerFormatting {
        serial: String,
        role: ServerRole,
        command: String,
    },

    #[error("Old {role} server for {serial} is {server}, not in whitelist")]
    ServerWhitelist {
        serial: String,
        role: ServerRole,
        server: String,
    },

    #[error("Unable to set {role} server for {serial} to {server}, as that option is unavailable")]
    ServerUnavailable {
        serial: String,
        role: ServerRole,
        server: String,
    },

    #[error("Response to pending command {pending_id} is not a valid hex field: {source}")]
    Response {
        pending_id: PendingCommandId,
        #[source]
        source: hex::FromHexError,
    },

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Device task aborted: {0}")]
    Aborted(String),
}

/// What happened to one setting of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingOutcome {
    /// The new-style value was already whitelisted
    AlreadyAcceptable { current: String },
    /// A set command was queued for the value taken from the legacy setting
    Queued {
        value: String,
        pending_id: PendingCommandId,
    },
}

/// Summary of a completed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub serial: String,
    pub apn: SettingOutcome,
    pub main_server: SettingOutcome,
    pub alt_server: SettingOutcome,
    pub set_ports: PendingCommandId,
}

//! Command library ids used by the migration
//!
//! The ids are assigned by the command library in the store, so they are
//! supplied through the `[commands]` config table rather than compiled in.

use serde::Deserialize;

/// Library ids of the predefined commands the workflow issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CommandIds {
    /// Write the v2.5 SSL and non-SSL ports
    pub set_new_ports: i64,
    /// Read the legacy `AT+CSTT` APN command
    pub get_old_apn: i64,
    /// Read the new-style APN field as hex
    pub get_new_apn_hex: i64,
    /// Read the legacy `AT+CIPSTART` main server command
    pub get_old_main_host: i64,
    /// Read the new-style main server field as hex
    pub get_new_main_host_hex: i64,
    /// Read the legacy `AT+CIPSTART` alt server command
    pub get_old_alt_host: i64,
    /// Read the new-style alt server field as hex
    pub get_new_alt_host_hex: i64,
}

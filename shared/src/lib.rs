//! Zephyr Shared Command Core
//!
//! This crate provides the command dispatch and response correlation core used
//! to reconfigure Zephyr field units through the shared command queue.
//!
//! - [`CommandChannel`] owns the single store connection and serializes every
//!   round trip on it.
//! - [`AdaptivePoller`] blocks callers until a correlated response arrives,
//!   backing off as more callers wait at once.

pub mod backoff;
pub mod channel;
pub mod error;
pub mod poller;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

pub use backoff::{Backoff, BackoffPolicy, BackoffState, BackoffStep};
pub use channel::CommandChannel;
pub use error::CommandError;
pub use poller::{AdaptivePoller, WaitOptions};
pub use store::{CommandStore, MySqlStore, SqliteStore};

/// Default backoff policy for the wait loop
pub mod policy {
    /// Sleep between the first probes of a wait, in seconds
    pub const INITIAL_INTERVAL_SECS: u64 = 10;

    /// Amount the sleep grows by each time waiters run out of patience
    pub const INCREMENT_SECS: u64 = 5;

    /// Failed probes per live waiter tolerated before the sleep grows
    pub const PATIENCE: u64 = 10;

    /// Upper bound on the sleep between probes, in seconds
    pub const MAX_INTERVAL_SECS: u64 = 600;
}

/// Status value of a freshly queued pending command. Other values belong to the executor.
pub const STATUS_PENDING: i64 = 0;

/// A command addressed to a single Zephyr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Identifier of a predefined command in the command library
    pub command_id: i64,
    /// Serial number of the addressed device
    pub target_device_id: String,
}

impl Command {
    /// Create a command for the given device
    pub fn new(command_id: i64, target_device_id: impl Into<String>) -> Self {
        Self {
            command_id,
            target_device_id: target_device_id.into(),
        }
    }
}

/// Store-assigned id of a pending command, used to correlate its response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingCommandId(pub i64);

impl PendingCommandId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PendingCommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PendingCommandId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A row of `pendingCommands` as queued by [`CommandChannel::enqueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommandRecord {
    pub id: PendingCommandId,
    pub status: i64,
    /// Internal `pod` key resolved from the serial number
    pub device_ref: i64,
    pub command_id: i64,
    pub inserted_at: String,
    pub repetition: i64,
}

//! Backing store seam for the command queue
//!
//! The core only ever issues two statements against the store: an
//! INSERT…SELECT to queue a pending command, and a SELECT by foreign key to
//! fetch its response. Each runs in its own transaction.

mod mysql;
mod sqlite;

pub use mysql::{MySqlCredentials, MySqlStore};
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::{Command, CommandError, PendingCommandId};

/// Queue a pending command for the device with the given serial number
pub(crate) const INSERT_PENDING_SQL: &str = "INSERT INTO pendingCommands \
     (status, id_pod, id_libraryCommand, insertionDateTime, repetition) \
     VALUES (0, (SELECT id_pod FROM pod WHERE serialNumber = ?), ?, CURRENT_TIMESTAMP, 0)";

/// Fetch the response recorded for a pending command
pub(crate) const SELECT_RESPONSE_SQL: &str =
    "SELECT response FROM executedCommands WHERE id_pendingCommand = ?";

/// A connection to the shared command queue
///
/// Implementations are not required to be safe for concurrent use;
/// [`CommandChannel`](crate::CommandChannel) serializes every call.
#[async_trait]
pub trait CommandStore: Send + 'static {
    /// Insert a pending command and commit it, returning its new id
    async fn insert_pending(&mut self, command: &Command) -> Result<PendingCommandId, CommandError>;

    /// Return the first response recorded for the pending command, if any
    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError>;

    /// Close the connection gracefully
    async fn close(self) -> Result<(), CommandError>;
}

//! Errors surfaced by the command core

use thiserror::Error;

use crate::PendingCommandId;

/// Errors that can occur while queueing commands or waiting for responses
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("No device with serial number {serial}")]
    DeviceNotFound { serial: String },

    #[error("Timed out waiting for response to pending command {pending_id}")]
    Timeout { pending_id: PendingCommandId },

    #[error("Cancelled while waiting for response to pending command {pending_id}")]
    Cancelled { pending_id: PendingCommandId },
}

impl CommandError {
    /// Classify a driver error from an enqueue against the given serial.
    ///
    /// A missing device surfaces as a NOT NULL violation on `id_pod`, since the
    /// device sub-select yields no row.
    pub fn from_enqueue(err: sqlx::Error, serial: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let not_null = matches!(db.kind(), sqlx::error::ErrorKind::NotNullViolation)
                || db.code().as_deref() == Some("1048");
            if not_null {
                return CommandError::DeviceNotFound {
                    serial: serial.to_string(),
                };
            }
        }
        CommandError::Connection(err.to_string())
    }
}

impl From<sqlx::Error> for CommandError {
    fn from(err: sqlx::Error) -> Self {
        CommandError::Connection(err.to_string())
    }
}

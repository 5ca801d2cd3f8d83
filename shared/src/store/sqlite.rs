//! SQLite backend, an embedded stand-in for the command queue
//!
//! Used for dry runs and tests. It carries the same three tables as the
//! production schema and answers the same two statements.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};

use super::{CommandStore, INSERT_PENDING_SQL, SELECT_RESPONSE_SQL};
use crate::{Command, CommandError, PendingCommandId, PendingCommandRecord};

const SCHEMA_SQL: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS pod (
        id_pod INTEGER PRIMARY KEY AUTOINCREMENT,
        serialNumber TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS pendingCommands (
        id_pendingCommand INTEGER PRIMARY KEY AUTOINCREMENT,
        status INTEGER NOT NULL,
        id_pod INTEGER NOT NULL REFERENCES pod(id_pod),
        id_libraryCommand INTEGER NOT NULL,
        insertionDateTime TEXT NOT NULL,
        repetition INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS executedCommands (
        id_executedCommand INTEGER PRIMARY KEY AUTOINCREMENT,
        id_pendingCommand INTEGER NOT NULL,
        response TEXT
    )",
];

/// A single SQLite connection to the command queue
pub struct SqliteStore {
    conn: SqliteConnection,
}

impl SqliteStore {
    /// Open the database at `url` (e.g. `sqlite::memory:`), creating the schema if needed
    pub async fn open(url: &str) -> Result<Self, CommandError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await?;

        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&mut conn).await?;
        }

        Ok(Self { conn })
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self, CommandError> {
        Self::open("sqlite::memory:").await
    }

    /// Add a device to the `pod` table, returning its internal id
    pub async fn register_device(&mut self, serial: &str) -> Result<i64, CommandError> {
        let result = sqlx::query("INSERT INTO pod (serialNumber) VALUES (?)")
            .bind(serial)
            .execute(&mut self.conn)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record a response the way the external executor would
    pub async fn record_response(
        &mut self,
        pending_id: PendingCommandId,
        response: &str,
    ) -> Result<(), CommandError> {
        sqlx::query("INSERT INTO executedCommands (id_pendingCommand, response) VALUES (?, ?)")
            .bind(pending_id.get())
            .bind(response)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    /// Read back a queued command
    pub async fn pending_command(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<PendingCommandRecord>, CommandError> {
        let row = sqlx::query(
            "SELECT id_pendingCommand, status, id_pod, id_libraryCommand, \
             insertionDateTime, repetition \
             FROM pendingCommands WHERE id_pendingCommand = ?",
        )
        .bind(pending_id.get())
        .fetch_optional(&mut self.conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(PendingCommandRecord {
            id: PendingCommandId(row.try_get("id_pendingCommand")?),
            status: row.try_get("status")?,
            device_ref: row.try_get("id_pod")?,
            command_id: row.try_get("id_libraryCommand")?,
            inserted_at: row.try_get("insertionDateTime")?,
            repetition: row.try_get("repetition")?,
        }))
    }

    /// Number of rows in `pendingCommands`
    pub async fn pending_count(&mut self) -> Result<i64, CommandError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pendingCommands")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CommandStore for SqliteStore {
    async fn insert_pending(
        &mut self,
        command: &Command,
    ) -> Result<PendingCommandId, CommandError> {
        let mut tx = self.conn.begin().await?;
        let result = sqlx::query(INSERT_PENDING_SQL)
            .bind(&command.target_device_id)
            .bind(command.command_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommandError::from_enqueue(e, &command.target_device_id))?;
        tx.commit().await?;

        Ok(PendingCommandId(result.last_insert_rowid()))
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        let mut tx = self.conn.begin().await?;
        let response: Option<Option<String>> = sqlx::query_scalar(SELECT_RESPONSE_SQL)
            .bind(pending_id.get())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(response.flatten())
    }

    async fn close(self) -> Result<(), CommandError> {
        self.conn.close().await?;
        Ok(())
    }
}

//! MySQL backend for the production command queue

use std::fmt;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tracing::info;

use super::{CommandStore, INSERT_PENDING_SQL, SELECT_RESPONSE_SQL};
use crate::{Command, CommandError, PendingCommandId};

/// Connection parameters for the MySQL command queue
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    pub database: String,
    pub port: u16,
}

impl fmt::Debug for MySqlCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

/// A single MySQL connection to the command queue
pub struct MySqlStore {
    conn: MySqlConnection,
}

impl MySqlStore {
    /// Open the connection
    pub async fn connect(credentials: &MySqlCredentials) -> Result<Self, CommandError> {
        let options = MySqlConnectOptions::new()
            .host(&credentials.host)
            .port(credentials.port)
            .username(&credentials.user)
            .password(&credentials.password)
            .database(&credentials.database);

        let conn = MySqlConnection::connect_with(&options).await?;
        info!(
            "Connected to command queue {}@{}:{}/{}",
            credentials.user, credentials.host, credentials.port, credentials.database
        );

        Ok(Self { conn })
    }
}

#[async_trait]
impl CommandStore for MySqlStore {
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

        Ok(PendingCommandId(result.last_insert_id() as i64))
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        // A read transaction per probe; a long-lived REPEATABLE READ snapshot
        // would never observe the executor's writes.
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

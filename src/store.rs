//! Runtime choice of command queue backend

use async_trait::async_trait;
use zephyr_shared::{
    Command, CommandError, CommandStore, MySqlStore, PendingCommandId, SqliteStore,
};

/// The store selected at startup
pub enum Backend {
    MySql(MySqlStore),
    Sqlite(SqliteStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::MySql(_) => "MySQL",
            Backend::Sqlite(_) => "SQLite",
        }
    }
}

#[async_trait]
impl CommandStore for Backend {
    async fn insert_pending(
        &mut self,
        command: &Command,
    ) -> Result<PendingCommandId, CommandError> {
        match self {
            Backend::MySql(store) => store.insert_pending(command).await,
            Backend::Sqlite(store) => store.insert_pending(command).await,
        }
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        match self {
            Backend::MySql(store) => store.fetch_response(pending_id).await,
            Backend::Sqlite(store) => store.fetch_response(pending_id).await,
        }
    }

    async fn close(self) -> Result<(), CommandError> {
        match self {
            Backend::MySql(store) => store.close().await,
            Backend::Sqlite(store) => store.close().await,
        }
    }
}

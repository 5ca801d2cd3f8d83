//! Command channel: exclusive access to the shared store connection
//!
//! Every store round trip and every backoff mutation happens while holding the
//! same lock, so no two operations ever interleave on the connection.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::backoff::{Backoff, BackoffState, BackoffStep};
use crate::{Command, CommandError, CommandStore, PendingCommandId};

/// Result of a single probe made by the wait loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The executor has recorded a response
    Found(String),
    /// Nothing yet; sleep for the given interval before probing again
    Pending(Duration),
}

struct ChannelInner<S> {
    store: S,
    backoff: Backoff,
}

/// Serializes all access to one store connection across concurrent callers
pub struct CommandChannel<S> {
    inner: Mutex<ChannelInner<S>>,
}

impl<S: CommandStore> CommandChannel<S> {
    /// Create a channel owning `store`
    pub fn new(store: S, backoff: Backoff) -> Self {
        Self {
            inner: Mutex::new(ChannelInner { store, backoff }),
        }
    }

    /// Queue a command for a device and return its correlation id
    pub async fn enqueue(
        &self,
        command_id: i64,
        target_device_id: &str,
    ) -> Result<PendingCommandId, CommandError> {
        let command = Command::new(command_id, target_device_id);

        let mut inner = self.inner.lock().await;
        let pending_id = inner.store.insert_pending(&command).await?;
        drop(inner);

        debug!(
            "Queued command {} to Zephyr {} (pending={})",
            command_id, target_device_id, pending_id
        );
        Ok(pending_id)
    }

    /// Probe once for a response without blocking or retrying
    pub async fn lookup_response(
        &self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        let mut inner = self.inner.lock().await;
        inner.store.fetch_response(pending_id).await
    }

    /// Probe once, and on a miss advance the shared backoff
    pub(crate) async fn probe(
        &self,
        pending_id: PendingCommandId,
        live_waiters: usize,
    ) -> Result<Probe, CommandError> {
        let mut inner = self.inner.lock().await;

        if let Some(response) = inner.store.fetch_response(pending_id).await? {
            return Ok(Probe::Found(response));
        }

        if let BackoffStep::Raised { from, to } = inner.backoff.progress(live_waiters) {
            debug!(
                "Poll interval raised {}s -> {}s ({} waiters)",
                from, to, live_waiters
            );
        }

        Ok(Probe::Pending(inner.backoff.interval()))
    }

    /// Snapshot of the shared backoff counters
    pub async fn backoff(&self) -> BackoffState {
        self.inner.lock().await.backoff.state()
    }

    /// Close the underlying connection
    pub async fn close(self) -> Result<(), CommandError> {
        self.inner.into_inner().store.close().await
    }
}

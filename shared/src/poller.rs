//! Adaptive poller: blocking waits for correlated responses
//!
//! Waiting is a sleep-and-retry loop over [`CommandChannel`] probes:
//!
//! ```text
//! POLLING --(probe hit)--> DONE
//!    ^          |
//!    |      (probe miss: advance backoff)
//!    +--- sleep current interval (lock released)
//! ```
//!
//! The loop has no built-in timeout. Devices are assumed to answer eventually,
//! so callers that need a bound pass a deadline or cancellation token through
//! [`WaitOptions`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::BackoffState;
use crate::channel::Probe;
use crate::{CommandChannel, CommandError, CommandStore, PendingCommandId};

/// Optional bounds on a wait
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Give up with [`CommandError::Timeout`] once this instant has passed
    pub deadline: Option<Instant>,
    /// Give up with [`CommandError::Cancelled`] when this token fires
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Registers a caller as a live waiter for as long as it is held
struct WaiterGuard<'a> {
    count: &'a AtomicUsize,
}

impl<'a> WaiterGuard<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sends commands and waits for their responses, shared by every device task
pub struct AdaptivePoller<S> {
    channel: CommandChannel<S>,
    live_waiters: AtomicUsize,
    set_ports_command_id: i64,
}

impl<S: CommandStore> AdaptivePoller<S> {
    /// Create a poller over `channel`; `set_ports_command_id` backs [`Self::set_ports`]
    pub fn new(channel: CommandChannel<S>, set_ports_command_id: i64) -> Self {
        Self {
            channel,
            live_waiters: AtomicUsize::new(0),
            set_ports_command_id,
        }
    }

    /// Queue a command for a device
    pub async fn send_command(
        &self,
        command_id: i64,
        target_device_id: &str,
    ) -> Result<PendingCommandId, CommandError> {
        self.channel.enqueue(command_id, target_device_id).await
    }

    /// Queue the command that sets the new-style ports
    pub async fn set_ports(
        &self,
        target_device_id: &str,
    ) -> Result<PendingCommandId, CommandError> {
        let pending_id = self
            .send_command(self.set_ports_command_id, target_device_id)
            .await?;
        info!("Queued set-ports for Zephyr {} (pending={})", target_device_id, pending_id);
        Ok(pending_id)
    }

    /// Block until the executor records a response for `pending_id`
    ///
    /// Never times out; use [`Self::wait_for_response_with`] to bound the wait.
    pub async fn wait_for_response(
        &self,
        pending_id: PendingCommandId,
    ) -> Result<String, CommandError> {
        self.wait_for_response_with(pending_id, &WaitOptions::default())
            .await
    }

    /// Block until a response arrives, the deadline passes, or the wait is cancelled
    ///
    /// A probe is always made at the deadline itself before giving up.
    pub async fn wait_for_response_with(
        &self,
        pending_id: PendingCommandId,
        options: &WaitOptions,
    ) -> Result<String, CommandError> {
        let _waiter = WaiterGuard::enter(&self.live_waiters);

        loop {
            // The probe at the deadline leaves the shared backoff alone
            if options.deadline.is_some_and(|d| Instant::now() >= d) {
                return match self.channel.lookup_response(pending_id).await? {
                    Some(response) => Ok(response),
                    None => Err(CommandError::Timeout { pending_id }),
                };
            }

            let live_waiters = self.live_waiters();
            match self.channel.probe(pending_id, live_waiters).await? {
                Probe::Found(response) => {
                    debug!("Pending command {} answered: {:?}", pending_id, response);
                    return Ok(response);
                }
                Probe::Pending(interval) => {
                    debug!(
                        "No response for pending command {} yet, sleeping {}s",
                        pending_id,
                        interval.as_secs()
                    );
                    pause(pending_id, interval, options).await?;
                }
            }
        }
    }

    /// Number of callers currently blocked in a wait
    pub fn live_waiters(&self) -> usize {
        self.live_waiters.load(Ordering::SeqCst)
    }

    /// Snapshot of the shared backoff counters
    pub async fn backoff(&self) -> BackoffState {
        self.channel.backoff().await
    }

    /// Close the underlying connection
    pub async fn close(self) -> Result<(), CommandError> {
        self.channel.close().await
    }
}

/// Sleep for `interval`, cut short by the deadline or the cancellation token
async fn pause(
    pending_id: PendingCommandId,
    interval: Duration,
    options: &WaitOptions,
) -> Result<(), CommandError> {
    let mut wake = Instant::now() + interval;
    if let Some(deadline) = options.deadline {
        wake = wake.min(deadline);
    }

    match &options.cancel {
        Some(token) => {
            tokio::select! {
                _ = sleep_until(wake) => Ok(()),
                _ = token.cancelled() => Err(CommandError::Cancelled { pending_id }),
            }
        }
        None => {
            sleep_until(wake).await;
            Ok(())
        }
    }
}

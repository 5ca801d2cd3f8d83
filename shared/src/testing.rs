//! Test doubles for the store seam

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{Command, CommandError, CommandStore, PendingCommandId};

#[derive(Default)]
struct Tables {
    pods: HashMap<String, i64>,
    pending: Vec<(PendingCommandId, i64, i64)>,
    executed: Vec<(PendingCommandId, String)>,
}

/// In-process store with a handle tests use to play the executor
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn with_devices(serials: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut tables = store.tables.lock().unwrap();
            for (i, serial) in serials.iter().enumerate() {
                tables.pods.insert((*serial).to_string(), i as i64 + 1);
            }
        }
        store
    }

    pub fn handle(&self) -> MemoryStore {
        self.clone()
    }

    pub fn record_response(&self, pending_id: PendingCommandId, response: &str) {
        self.tables
            .lock()
            .unwrap()
            .executed
            .push((pending_id, response.to_string()));
    }

    pub fn pending_len(&self) -> usize {
        self.tables.lock().unwrap().pending.len()
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn insert_pending(
        &mut self,
        command: &Command,
    ) -> Result<PendingCommandId, CommandError> {
        let mut tables = self.tables.lock().unwrap();
        let pod = *tables
            .pods
            .get(&command.target_device_id)
            .ok_or_else(|| CommandError::DeviceNotFound {
                serial: command.target_device_id.clone(),
            })?;
        let id = PendingCommandId(tables.pending.len() as i64 + 1);
        tables.pending.push((id, pod, command.command_id));
        Ok(id)
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .executed
            .iter()
            .find(|(id, _)| *id == pending_id)
            .map(|(_, response)| response.clone()))
    }

    async fn close(self) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Counters shared between an [`InstrumentedStore`] and the test observing it
#[derive(Clone, Default)]
pub struct CallProbe {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
}

impl CallProbe {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a store and records how many calls were ever in flight at once
pub struct InstrumentedStore<S> {
    inner: S,
    probe: CallProbe,
}

impl<S> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            probe: CallProbe::default(),
        }
    }

    pub fn probe(&self) -> CallProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl<S: CommandStore + Sync> CommandStore for InstrumentedStore<S> {
    async fn insert_pending(
        &mut self,
        command: &Command,
    ) -> Result<PendingCommandId, CommandError> {
        self.probe.enter();
        // Widen the window so overlapping calls would be observed
        tokio::task::yield_now().await;
        let result = self.inner.insert_pending(command).await;
        self.probe.exit();
        result
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        self.probe.enter();
        self.probe.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let result = self.inner.fetch_response(pending_id).await;
        self.probe.exit();
        result
    }

    async fn close(self) -> Result<(), CommandError> {
        self.inner.close().await
    }
}

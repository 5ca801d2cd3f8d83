//! Scripted command queue for workflow tests

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use zephyr_shared::{
    AdaptivePoller, Backoff, Command, CommandChannel, CommandError, CommandStore, PendingCommandId,
};

use super::MigrationContext;
use crate::command_ids::CommandIds;
use crate::config::WhitelistConfig;

pub const COMMANDS: CommandIds = CommandIds {
    set_new_ports: 10,
    get_old_apn: 11,
    get_new_apn_hex: 12,
    get_old_main_host: 13,
    get_new_main_host_hex: 14,
    get_old_alt_host: 15,
    get_new_alt_host_hex: 16,
};

const APN_WHITELIST: &str = "\"iot.net\",\"user\",\"pw\":31\n";
const SERVER_WHITELIST: &str = "main.example.com:42:43\naq76.example.com:44:\n";

/// Hex dump of an EEPROM field holding `value`
pub fn nt_hex(value: &str) -> String {
    format!("{}00ffffff", hex::encode(value))
}

#[derive(Default)]
struct Script {
    devices: HashSet<String>,
    responses: HashMap<i64, String>,
    queued: Vec<Command>,
}

/// Answers every queued command whose library id has a scripted response
#[derive(Clone, Default)]
pub struct ScriptedStore {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl CommandStore for ScriptedStore {
    async fn insert_pending(
        &mut self,
        command: &Command,
    ) -> Result<PendingCommandId, CommandError> {
        let mut script = self.script.lock().unwrap();
        if !script.devices.contains(&command.target_device_id) {
            return Err(CommandError::DeviceNotFound {
                serial: command.target_device_id.clone(),
            });
        }
        script.queued.push(command.clone());
        Ok(PendingCommandId(script.queued.len() as i64))
    }

    async fn fetch_response(
        &mut self,
        pending_id: PendingCommandId,
    ) -> Result<Option<String>, CommandError> {
        let script = self.script.lock().unwrap();
        let command = usize::try_from(pending_id.get() - 1)
            .ok()
            .and_then(|index| script.queued.get(index));
        Ok(command.and_then(|c| script.responses.get(&c.command_id).cloned()))
    }

    async fn close(self) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Whitelists on disk plus a scripted store
pub struct Fixture {
    dir: TempDir,
    store: ScriptedStore,
}

impl Fixture {
    pub fn new(devices: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("apn_whitelist.txt"), APN_WHITELIST).unwrap();
        std::fs::write(dir.path().join("server_whitelist.txt"), SERVER_WHITELIST).unwrap();

        let store = ScriptedStore::default();
        store
            .script
            .lock()
            .unwrap()
            .devices
            .extend(devices.iter().map(|d| d.to_string()));

        Self { dir, store }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn respond(&self, command_id: i64, response: &str) {
        self.store
            .script
            .lock()
            .unwrap()
            .responses
            .insert(command_id, response.to_string());
    }

    pub fn queued_commands(&self) -> Vec<i64> {
        self.store
            .script
            .lock()
            .unwrap()
            .queued
            .iter()
            .map(|c| c.command_id)
            .collect()
    }

    pub fn queued_for(&self, serial: &str) -> Vec<i64> {
        self.store
            .script
            .lock()
            .unwrap()
            .queued
            .iter()
            .filter(|c| c.target_device_id == serial)
            .map(|c| c.command_id)
            .collect()
    }

    pub fn all_for(&self, serial: &str) -> bool {
        self.store
            .script
            .lock()
            .unwrap()
            .queued
            .iter()
            .all(|c| c.target_device_id == serial)
    }

    pub fn context(&self) -> MigrationContext<ScriptedStore> {
        let channel = CommandChannel::new(self.store.clone(), Backoff::default());
        MigrationContext {
            poller: AdaptivePoller::new(channel, COMMANDS.set_new_ports),
            commands: COMMANDS,
            whitelists: WhitelistConfig {
                apn: self.dir().join("apn_whitelist.txt"),
                server: self.dir().join("server_whitelist.txt"),
            },
        }
    }
}

//! Migration of a single unit

use tracing::{debug, info, warn};
use zephyr_shared::{AdaptivePoller, CommandStore, PendingCommandId};

use super::{MigrationContext, MigrationError, MigrationReport, SettingOutcome};
use crate::decode::{
    decode_nt_hex, parse_apn_command, parse_server_command, strip_status, trim_apn_suffix,
};
use crate::whitelist::{ApnWhitelist, ServerRole, ServerWhitelist};

/// Read a unit's settings, queue whatever set commands it needs, then set its ports
pub async fn migrate_device<S: CommandStore>(
    ctx: &MigrationContext<S>,
    serial: &str,
) -> Result<MigrationReport, MigrationError> {
    let poller = &ctx.poller;
    let ids = &ctx.commands;

    // Queue every read up front; the unit answers them in one session
    let old_apn_id = poller.send_command(ids.get_old_apn, serial).await?;
    debug!("Sent GET_OLD_APN command");
    let new_apn_id = poller.send_command(ids.get_new_apn_hex, serial).await?;
    debug!("Sent GET_NEW_APN_HEX command");
    let old_main_id = poller.send_command(ids.get_old_main_host, serial).await?;
    debug!("Sent GET_OLD_MAIN_HOST command");
    let new_main_id = poller.send_command(ids.get_new_main_host_hex, serial).await?;
    debug!("Sent GET_NEW_MAIN_HOST_HEX command");
    let old_alt_id = poller.send_command(ids.get_old_alt_host, serial).await?;
    debug!("Sent GET_OLD_ALT_HOST command");
    let new_alt_id = poller.send_command(ids.get_new_alt_host_hex, serial).await?;
    debug!("Sent GET_NEW_ALT_HOST_HEX command");
    info!("Sent all commands to get information");

    // Only the first wait should block in practice
    let old_apn = read_plain(poller, old_apn_id).await?;
    info!("Old APN command is {}", old_apn);
    let new_apn = read_hex(poller, new_apn_id).await?;
    info!("Current new APN is {}", new_apn);
    let old_main = read_plain(poller, old_main_id).await?;
    info!("Old main server command is {}", old_main);
    let new_main = read_hex(poller, new_main_id).await?;
    info!("Current new main server is {}", new_main);
    let old_alt = read_plain(poller, old_alt_id).await?;
    info!("Old alt server command is {}", old_alt);
    let new_alt = read_hex(poller, new_alt_id).await?;
    info!("Current new alt server is {}", new_alt);

    let apns = ApnWhitelist::load(&ctx.whitelists.apn)?;
    if apns.is_empty() {
        warn!("APN whitelist {} is empty", ctx.whitelists.apn.display());
    }
    debug!("Read APN whitelist with {} entries", apns.len());

    let apn = if apns.contains(trim_apn_suffix(&new_apn)) {
        info!("New APN {} already acceptable", new_apn);
        SettingOutcome::AlreadyAcceptable { current: new_apn }
    } else {
        set_new_apn(poller, serial, &old_apn, &apns).await?
    };

    let servers = ServerWhitelist::load(&ctx.whitelists.server)?;
    if servers.is_empty() {
        warn!("Server whitelist {} is empty", ctx.whitelists.server.display());
    }
    debug!("Read server whitelist with {} entries", servers.len());

    let main_server =
        check_server(poller, serial, new_main, &old_main, &servers, ServerRole::Main).await?;
    let alt_server =
        check_server(poller, serial, new_alt, &old_alt, &servers, ServerRole::Alt).await?;

    let set_ports = poller.set_ports(serial).await?;

    Ok(MigrationReport {
        serial: serial.to_string(),
        apn,
        main_server,
        alt_server,
        set_ports,
    })
}

async fn read_plain<S: CommandStore>(
    poller: &AdaptivePoller<S>,
    pending_id: PendingCommandId,
) -> Result<String, MigrationError> {
    let response = poller.wait_for_response(pending_id).await?;
    Ok(strip_status(&response).to_string())
}

async fn read_hex<S: CommandStore>(
    poller: &AdaptivePoller<S>,
    pending_id: PendingCommandId,
) -> Result<String, MigrationError> {
    let response = poller.wait_for_response(pending_id).await?;
    decode_nt_hex(strip_status(&response))
        .map_err(|source| MigrationError::Response { pending_id, source })
}

async fn set_new_apn<S: CommandStore>(
    poller: &AdaptivePoller<S>,
    serial: &str,
    old_apn_command: &str,
    apns: &ApnWhitelist,
) -> Result<SettingOutcome, MigrationError> {
    debug!("Starting to set new APN");

    let apn = parse_apn_command(old_apn_command).ok_or_else(|| MigrationError::ApnFormatting {
        serial: serial.to_string(),
        command: old_apn_command.to_string(),
    })?;
    info!("Found APN and password as {}", apn);

    let command_id = apns
        .command_for(apn)
        .ok_or_else(|| MigrationError::ApnWhitelist {
            serial: serial.to_string(),
            apn: apn.to_string(),
        })?;
    debug!("Command to set APN is {}", command_id);

    let pending_id = poller.send_command(command_id, serial).await?;
    info!("Queued up command to set APN to {}", apn);

    Ok(SettingOutcome::Queued {
        value: apn.to_string(),
        pending_id,
    })
}

async fn check_server<S: CommandStore>(
    poller: &AdaptivePoller<S>,
    serial: &str,
    current: String,
    old_command: &str,
    servers: &ServerWhitelist,
    role: ServerRole,
) -> Result<SettingOutcome, MigrationError> {
    if servers.contains(&current) {
        info!("New {} server {} is already acceptable", role, current);
        return Ok(SettingOutcome::AlreadyAcceptable { current });
    }

    debug!("Starting to set new {} server", role);

    let server = parse_server_command(old_command).ok_or_else(|| {
        MigrationError::ServerFormatting {
            serial: serial.to_string(),
            role,
            command: old_command.to_string(),
        }
    })?;
    info!("Found {} server as {}", role, server);

    let commands = servers
        .get(server)
        .ok_or_else(|| MigrationError::ServerWhitelist {
            serial: serial.to_string(),
            role,
            server: server.to_string(),
        })?;

    // e.g. there is no command to select AQ76 as the alt server
    let command_id = commands
        .for_role(role)
        .ok_or_else(|| MigrationError::ServerUnavailable {
            serial: serial.to_string(),
            role,
            server: server.to_string(),
        })?;
    debug!("Command to set {} server is {}", role, command_id);

    let pending_id = poller.send_command(command_id, serial).await?;
    info!("Queued up command to set {} server to {}", role, server);

    Ok(SettingOutcome::Queued {
        value: server.to_string(),
        pending_id,
    })
}

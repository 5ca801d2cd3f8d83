mod command_ids;
mod config;
mod credentials;
mod decode;
mod migration;
mod store;
mod whitelist;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{load_device_list, Config, LoggingConfig};
use credentials::{CredentialFile, CredentialSource};
use migration::MigrationContext;
use store::Backend;
use zephyr_shared::{
    AdaptivePoller, Backoff, BackoffPolicy, CommandChannel, MySqlStore, SqliteStore,
};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Queue the commands that move Zephyrs onto the v2.5 connection settings
#[derive(Parser, Debug)]
#[command(name = "zephyr-migrate", version)]
struct Args {
    /// Configuration file (default ./zephyr-migrate.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File of serial numbers, one per line
    #[arg(short, long)]
    devices: Option<PathBuf>,

    /// Use an SQLite command queue at this URL instead of MySQL
    #[arg(long, value_name = "URL")]
    sqlite: Option<String>,

    /// Serial numbers of the units to migrate
    serials: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    init_tracing(&config.logging)?;

    let mut serials = args.serials;
    if let Some(path) = &args.devices {
        serials.extend(load_device_list(path)?);
    }
    if serials.is_empty() {
        bail!("No Zephyr serial numbers given");
    }

    let backend = open_backend(&config, args.sqlite.as_deref()).await?;
    info!("Command queue backend: {}", backend.name());

    let backoff = Backoff::new(BackoffPolicy::from(&config.backoff));
    let ctx = Arc::new(MigrationContext {
        poller: AdaptivePoller::new(
            CommandChannel::new(backend, backoff),
            config.commands.set_new_ports,
        ),
        commands: config.commands,
        whitelists: config.whitelists.clone(),
    });

    let outcomes = migration::run(ctx.clone(), serials).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        "{} of {} Zephyrs migrated",
        outcomes.len() - failed,
        outcomes.len()
    );

    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx
            .poller
            .close()
            .await
            .context("Failed to close command queue connection")?,
        Err(_) => warn!("Command queue still in use at shutdown"),
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Log to stderr and, unless disabled, append to the configured log file
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

async fn open_backend(config: &Config, sqlite_override: Option<&str>) -> Result<Backend> {
    if let Some(url) = sqlite_override.or(config.database.sqlite_url.as_deref()) {
        let store = SqliteStore::open(url)
            .await
            .with_context(|| format!("Failed to open SQLite command queue {}", url))?;
        return Ok(Backend::Sqlite(store));
    }

    let source = CredentialFile::load(&config.credentials.path)?;
    let credentials = source.credentials(&config.database.profile)?;
    let store = MySqlStore::connect(&credentials.into_mysql(config.database.port))
        .await
        .context("Failed to connect to command queue")?;

    Ok(Backend::MySql(store))
}

//! One task per unit over a shared poller

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, info_span, Instrument};
use zephyr_shared::CommandStore;

use super::{migrate_device, MigrationContext, MigrationError, MigrationReport};

/// Result of migrating one unit
#[derive(Debug)]
pub struct DeviceOutcome {
    pub serial: String,
    pub result: Result<MigrationReport, MigrationError>,
}

/// Migrate every unit concurrently, returning outcomes in input order
///
/// A failing unit only ends its own task.
pub async fn run<S: CommandStore>(
    ctx: Arc<MigrationContext<S>>,
    serials: Vec<String>,
) -> Vec<DeviceOutcome> {
    let mut handles = Vec::with_capacity(serials.len());
    for serial in &serials {
        let ctx = ctx.clone();
        let task_serial = serial.clone();
        let span = info_span!("zephyr", serial = %serial);

        handles.push(tokio::spawn(
            async move { migrate_device(&ctx, &task_serial).await }.instrument(span),
        ));
        info!("Started task for Zephyr {}", serial);
    }

    let results = join_all(handles).await;

    serials
        .into_iter()
        .zip(results)
        .map(|(serial, joined)| {
            let result = joined.unwrap_or_else(|e| Err(MigrationError::Aborted(e.to_string())));
            match &result {
                Ok(report) => info!(
                    "Zephyr {} done, set-ports queued as pending command {}",
                    serial, report.set_ports
                ),
                Err(e) => error!("Zephyr {} failed: {}", serial, e),
            }
            DeviceOutcome { serial, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::testing::{nt_hex, Fixture};
    use crate::migration::SettingOutcome;
    use zephyr_shared::CommandError;

    fn configured(fixture: &Fixture) {
        fixture.respond(11, "0AT+CSTT=\"iot.net\",\"user\",\"pw\"");
        fixture.respond(12, &format!("0{}", nt_hex("")));
        fixture.respond(13, "0AT+CIPSTART=\"TCP\",\"main.example.com\",\"5000\"");
        fixture.respond(14, &format!("0{}", nt_hex("main.example.com")));
        fixture.respond(15, "0AT+CIPSTART=\"TCP\",\"main.example.com\",\"5001\"");
        fixture.respond(16, &format!("0{}", nt_hex("main.example.com")));
    }

    #[tokio::test]
    async fn test_run_migrates_each_device() {
        let fixture = Fixture::new(&["TM400059", "TM400060"]);
        configured(&fixture);
        let ctx = Arc::new(fixture.context());

        let outcomes = run(ctx.clone(), vec!["TM400059".into(), "TM400060".into()]).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].serial, "TM400059");
        assert_eq!(outcomes[1].serial, "TM400060");
        for outcome in &outcomes {
            let report = outcome.result.as_ref().unwrap();
            assert!(matches!(report.apn, SettingOutcome::Queued { .. }));
            assert!(matches!(
                report.main_server,
                SettingOutcome::AlreadyAcceptable { .. }
            ));
            assert_eq!(
                fixture.queued_for(&outcome.serial),
                vec![11, 12, 13, 14, 15, 16, 31, 10]
            );
        }
        assert_eq!(ctx.poller.live_waiters(), 0);
    }

    #[tokio::test]
    async fn test_failing_device_does_not_stop_others() {
        let fixture = Fixture::new(&["TM400059"]);
        configured(&fixture);
        let ctx = Arc::new(fixture.context());

        let outcomes = run(ctx, vec!["TM000000".into(), "TM400059".into()]).await;

        assert!(matches!(
            outcomes[0].result,
            Err(MigrationError::Command(CommandError::DeviceNotFound { .. }))
        ));
        assert!(outcomes[1].result.is_ok());
        assert!(fixture.queued_for("TM000000").is_empty());
    }

    #[tokio::test]
    async fn test_run_with_no_devices() {
        let fixture = Fixture::new(&[]);
        let outcomes = run(Arc::new(fixture.context()), Vec::new()).await;
        assert!(outcomes.is_empty());
    }
}

//! Monitor daemon.
//!
//! Runs the poll scheduler, the optional status endpoint and a console
//! presenter on one runtime until Ctrl-C.

use anyhow::Result;
use chrono::Local;
use clap::ArgMatches;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::core::monitor::{
    LogNotifier, MonitorParts, Notifier, PollScheduler, SmtpNotifier, SnapshotReceiver,
    SysinfoProbe, SystemServiceController,
};
use crate::ui;
use crate::web::StatusServer;

pub fn execute(matches: &ArgMatches, store: FileSettingsStore) -> Result<()> {
    let dry_run = matches.get_flag("dry-run");
    let serve = matches.get_flag("serve");
    let quiet = matches.get_flag("quiet");

    let settings = store.load();
    ui::dimmed(&format!("Settings: {}", store.path().display()));

    let notifier: Arc<dyn Notifier> = if dry_run {
        ui::info("Dry run: alerts are written to the log instead of sent");
        Arc::new(LogNotifier)
    } else {
        if !settings.email.is_configured() {
            ui::warn("Email is not configured, alerts will fail until [email] is filled in");
        }
        Arc::new(SmtpNotifier::new(settings.email.clone()))
    };

    let runtime = super::runtime()?;
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    runtime.block_on(async {
        let scheduler = Arc::new(PollScheduler::new(MonitorParts {
            store: Arc::new(store),
            probe: Arc::new(SysinfoProbe::new()),
            controller: Arc::new(SystemServiceController),
            notifier,
        }));

        let mut tasks = Vec::new();

        if serve || settings.server.enable_remote_monitoring {
            let server = StatusServer::new(
                settings.server.ip.clone(),
                settings.server.port,
                scheduler.subscribe(),
            );
            tasks.push(tokio::spawn(server.run(shutdown_tx.subscribe())));
        }

        if !quiet {
            tasks.push(tokio::spawn(present(
                scheduler.subscribe(),
                shutdown_tx.subscribe(),
            )));
        }

        let scheduler_shutdown = shutdown_tx.subscribe();

        // Every receiver exists before the handler can fire
        let ctrlc_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            let _ = ctrlc_tx.send(());
        })
        .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

        ui::success("Monitoring started. Press Ctrl+C to stop.");
        scheduler.run(scheduler_shutdown).await;

        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("Background task ended abnormally: {}", e);
            }
        }

        ui::info("Monitoring stopped.");
        Ok::<(), anyhow::Error>(())
    })
}

/// Print a summary line each time the scheduler publishes a snapshot
async fn present(mut snapshots: SnapshotReceiver, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", ui::summary_line(&snapshot, &Local::now()));
            }
        }
    }
}

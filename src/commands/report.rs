use anyhow::Result;
use chrono::Utc;
use clap::ArgMatches;
use std::sync::Arc;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::core::monitor::{
    send_report, AlertDispatcher, DispatchOutcome, HealthProbe, ReportKind, SmtpNotifier,
    SysinfoProbe,
};
use crate::ui;

pub fn execute(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    match matches.subcommand() {
        Some(("instant", _)) => instant(store),
        _ => {
            println!("Use 'hostwatch report --help' for more information.");
            Ok(())
        }
    }
}

/// Send an instant report now; the periodic schedule is left untouched
fn instant(store: &FileSettingsStore) -> Result<()> {
    let email = store.load().email;
    if !email.is_configured() {
        anyhow::bail!(
            "Email is not configured. Fill in [email] in {}",
            store.path().display()
        );
    }

    let notifier = Arc::new(SmtpNotifier::new(email.clone()));
    let dispatcher = AlertDispatcher::new(notifier, email);

    let outcome = super::runtime()?.block_on(async {
        let probe = SysinfoProbe::new();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        if let Err(e) = probe.refresh().await {
            log::warn!("Failed to refresh host metrics: {}", e);
        }
        send_report(&dispatcher, &probe, ReportKind::Instant, Utc::now()).await
    });

    match outcome {
        DispatchOutcome::Delivered => {
            ui::success("Instant report sent");
            Ok(())
        }
        _ => anyhow::bail!("Failed to send instant report, see the log for details"),
    }
}

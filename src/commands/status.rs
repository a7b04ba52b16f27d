use anyhow::{Context, Result};
use chrono::Utc;
use clap::ArgMatches;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::core::monitor::{collect_snapshot, HealthProbe, SysinfoProbe, TargetRegistry};
use crate::ui;

/// Probe once and print the same document the status endpoint serves
pub fn execute(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    let json = matches.get_flag("json");
    let registry = TargetRegistry::from_settings(&store.load());

    let snapshot = super::runtime()?.block_on(async {
        let probe = SysinfoProbe::new();
        // CPU usage needs two samples
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        probe.refresh().await?;
        Ok::<_, crate::error::HostwatchError>(
            collect_snapshot(&probe, &registry, Utc::now()).await,
        )
    })?;

    if json {
        println!(
            "{}",
            snapshot.to_json().context("Failed to serialize status")?
        );
    } else {
        ui::print_status(&snapshot);
    }

    Ok(())
}

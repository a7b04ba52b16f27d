//! `hostwatch targets`: manage what the daemon watches.
//!
//! Changes are written to the settings file; a running daemon picks them up
//! on its next cycle.

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::core::monitor::{MonitoredTarget, TargetRegistry};
use crate::ui;

pub fn execute(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => add(sub, store),
        Some(("remove", sub)) => remove(sub, store),
        Some(("list", _)) => list(store),
        Some(("disk", sub)) => set_disk(sub, store),
        Some(("disk-clear", sub)) => clear_disk(sub, store),
        _ => {
            println!("Use 'hostwatch targets --help' for more information.");
            Ok(())
        }
    }
}

fn target_from(matches: &ArgMatches) -> Result<MonitoredTarget> {
    let kind = matches
        .get_one::<String>("kind")
        .context("Target kind is required")?;
    let name = matches
        .get_one::<String>("name")
        .context("Target name is required")?;

    match kind.as_str() {
        "service" => Ok(MonitoredTarget::service(name.as_str())),
        "process" => Ok(MonitoredTarget::process(name.as_str())),
        other => anyhow::bail!("Unknown target kind '{}'", other),
    }
}

/// Load, mutate through the registry, and save back
fn update<F>(store: &FileSettingsStore, change: F) -> Result<bool>
where
    F: FnOnce(&TargetRegistry) -> Result<bool>,
{
    let mut settings = store.load();
    let registry = TargetRegistry::from_settings(&settings);

    let changed = change(&registry)?;
    if changed {
        registry.write_to_settings(&mut settings);
        store
            .save(&settings)
            .with_context(|| format!("Failed to write {}", store.path().display()))?;
    }
    Ok(changed)
}

fn add(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    let target = target_from(matches)?;
    let added = update(store, |registry| Ok(registry.add(target.clone())?))?;

    if added {
        ui::success(&format!("Now monitoring {}", target));
    } else {
        ui::warn(&format!("{} is already monitored", target));
    }
    Ok(())
}

fn remove(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    let target = target_from(matches)?;
    let removed = update(store, |registry| Ok(registry.remove(&target)))?;

    if removed {
        ui::success(&format!("Stopped monitoring {}", target));
    } else {
        ui::warn(&format!("{} was not monitored", target));
    }
    Ok(())
}

fn list(store: &FileSettingsStore) -> Result<()> {
    let registry = TargetRegistry::from_settings(&store.load());

    println!("{}", "Monitored targets".white().bold());
    ui::print_targets(&registry.targets());

    let disks = registry.disk_thresholds();
    if !disks.is_empty() {
        println!();
        println!("{}", "Disk thresholds".white().bold());
        for (device, percent) in disks {
            println!("  {:<10} {}%", device.cyan(), percent);
        }
    }
    Ok(())
}

fn set_disk(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    let device = matches
        .get_one::<String>("device")
        .context("Device is required")?;
    let percent = *matches
        .get_one::<i64>("percent")
        .context("Percent is required")?;

    update(store, |registry| {
        registry.set_disk_threshold(device, percent)?;
        Ok(true)
    })?;

    ui::success(&format!("Disk {} alerts above {}%", device, percent));
    Ok(())
}

fn clear_disk(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    let device = matches
        .get_one::<String>("device")
        .context("Device is required")?;

    if update(store, |registry| Ok(registry.clear_disk_threshold(device)))? {
        ui::success(&format!("Removed disk threshold for {}", device));
    } else {
        ui::warn(&format!("No threshold set for {}", device));
    }
    Ok(())
}

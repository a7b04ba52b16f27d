use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::monitor::{HealthProbe, SysinfoProbe};
use crate::ui;

/// List services or processes present on this host
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let (kind, sub) = matches
        .subcommand()
        .context("Choose 'services' or 'processes'")?;
    let filter = sub.get_one::<String>("filter").map(String::as_str);

    let probe = SysinfoProbe::new();
    let names = match kind {
        "services" => super::runtime()?
            .block_on(probe.service_names())
            .context("Failed to list services")?,
        "processes" => probe.process_names().into_iter().collect(),
        other => anyhow::bail!("Unknown scan target '{}'", other),
    };

    let matched = filter_names(names, filter);
    if matched.is_empty() {
        ui::dimmed("Nothing matched.");
        return Ok(());
    }

    for name in &matched {
        println!("  {}", name);
    }
    println!();
    println!("{}", format!("{} {} found", matched.len(), kind).cyan());
    Ok(())
}

/// Case-insensitive substring filter; output is sorted and unique
pub fn filter_names(names: Vec<String>, filter: Option<&str>) -> Vec<String> {
    let needle = filter.map(str::to_lowercase).unwrap_or_default();
    let mut matched: Vec<String> = names
        .into_iter()
        .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
        .collect();
    matched.sort_by_key(|name| name.to_lowercase());
    matched.dedup();
    matched
}

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::ui;

pub fn execute(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(store),
        Some(("path", _)) => {
            println!("{}", store.path().display());
            Ok(())
        }
        Some(("init", _)) => init(store),
        _ => {
            println!("Use 'hostwatch config --help' for more information.");
            Ok(())
        }
    }
}

/// Print the effective settings with the password masked
fn show(store: &FileSettingsStore) -> Result<()> {
    let mut settings = store.load();
    if !settings.email.password.is_empty() {
        settings.email.password = "********".to_string();
    }

    let text = settings
        .to_toml_string()
        .context("Failed to render settings")?;
    println!("{}", text);
    Ok(())
}

/// Write a settings file with every default filled in
fn init(store: &FileSettingsStore) -> Result<()> {
    if store.path().exists() {
        ui::warn(&format!(
            "{} already exists, leaving it untouched",
            store.path().display()
        ));
        return Ok(());
    }

    store
        .save(&store.load())
        .with_context(|| format!("Failed to write {}", store.path().display()))?;
    ui::success(&format!("Created {}", store.path().display()));
    Ok(())
}

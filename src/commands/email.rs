use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::{FileSettingsStore, SettingsStore};
use crate::core::monitor::SmtpNotifier;
use crate::ui;

pub fn execute(matches: &ArgMatches, store: &FileSettingsStore) -> Result<()> {
    match matches.subcommand() {
        Some(("test", _)) => test(store),
        _ => {
            println!("Use 'hostwatch email --help' for more information.");
            Ok(())
        }
    }
}

/// Connect and authenticate against the configured relay without sending
fn test(store: &FileSettingsStore) -> Result<()> {
    let email = store.load().email;
    ui::info(&format!(
        "Connecting to {}:{} as {}...",
        email.smtp_server, email.smtp_port, email.from
    ));

    let notifier = SmtpNotifier::new(email);
    super::runtime()?
        .block_on(notifier.test_connection())
        .context("SMTP connection test failed")?;

    ui::success("SMTP connection test succeeded");
    Ok(())
}

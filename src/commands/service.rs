use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::monitor::{ServiceController, SystemServiceController};
use crate::platform::services::ServiceAction;
use crate::ui;

/// Start, stop or restart a service right away
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let (action, sub) = match matches.subcommand() {
        Some(("start", sub)) => (ServiceAction::Start, sub),
        Some(("stop", sub)) => (ServiceAction::Stop, sub),
        Some(("restart", sub)) => (ServiceAction::Restart, sub),
        _ => {
            println!("Use 'hostwatch service --help' for more information.");
            return Ok(());
        }
    };

    let name = sub
        .get_one::<String>("name")
        .context("Service name is required")?;

    let controller = SystemServiceController;
    super::runtime()?
        .block_on(async {
            match action {
                ServiceAction::Start => controller.start(name).await,
                ServiceAction::Stop => controller.stop(name).await,
                ServiceAction::Restart => controller.restart(name).await,
            }
        })
        .with_context(|| format!("Failed to {} service '{}'", action.verb(), name))?;

    ui::success(&format!("Service '{}': {} done", name, action.verb()));
    Ok(())
}

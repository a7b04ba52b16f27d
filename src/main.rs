use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

use hostwatch::commands;
use hostwatch::core::config::FileSettingsStore;
use hostwatch::ui;

fn main() {
    let matches = build_cli().get_matches();
    hostwatch::init_logging(matches.get_flag("verbose"));

    if let Err(e) = dispatch(&matches) {
        ui::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn target_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("kind")
            .help("Target kind")
            .required(true)
            .value_parser(["service", "process"])
            .index(1),
    )
    .arg(
        Arg::new("name")
            .help("Service name or process executable name")
            .required(true)
            .index(2),
    )
}

fn service_arg(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("name")
            .help("Service name")
            .required(true)
            .index(1),
    )
}

fn build_cli() -> Command {
    Command::new("hostwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Host resource and service health monitor")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Settings file to use instead of the default location")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Start monitoring until Ctrl+C")
                .arg(
                    Arg::new("serve")
                        .long("serve")
                        .help("Serve GET /status even if remote monitoring is disabled in settings")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .help("Do not print a summary line after each cycle")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Write alerts to the log instead of sending email")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Probe once and print resource usage and target status")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the status document as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("targets")
                .about("Manage monitored services, processes and disk thresholds")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(target_args(
                    Command::new("add").about("Start monitoring a service or process"),
                ))
                .subcommand(target_args(
                    Command::new("remove").about("Stop monitoring a service or process"),
                ))
                .subcommand(Command::new("list").about("List monitored targets"))
                .subcommand(
                    Command::new("disk")
                        .about("Alert when a disk is used above a percentage")
                        .arg(
                            Arg::new("device")
                                .help("Disk device, e.g. C: or /dev/sda1")
                                .required(true)
                                .index(1),
                        )
                        .arg(
                            Arg::new("percent")
                                .help("Threshold between 1 and 100")
                                .required(true)
                                .allow_negative_numbers(true)
                                .value_parser(clap::value_parser!(i64))
                                .index(2),
                        ),
                )
                .subcommand(
                    Command::new("disk-clear")
                        .about("Remove a disk threshold")
                        .arg(
                            Arg::new("device")
                                .help("Disk device")
                                .required(true)
                                .index(1),
                        ),
                ),
        )
        .subcommand(
            Command::new("service")
                .about("Control an OS service")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(service_arg(
                    Command::new("start").about("Start a service if it is not running"),
                ))
                .subcommand(service_arg(
                    Command::new("stop").about("Stop a service if it is running"),
                ))
                .subcommand(service_arg(
                    Command::new("restart").about("Restart a service"),
                )),
        )
        .subcommand(
            Command::new("scan")
                .about("List services or processes present on this host")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("services").about("List OS services"))
                .subcommand(Command::new("processes").about("List running processes"))
                .arg(
                    Arg::new("filter")
                        .short('f')
                        .long("filter")
                        .value_name("TEXT")
                        .help("Only show names containing TEXT (case-insensitive)")
                        .global(true),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Send reports")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("instant").about("Send an instant system report now")),
        )
        .subcommand(
            Command::new("email")
                .about("Email settings")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("test").about("Connect to the SMTP server without sending"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect the settings file")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print effective settings"))
                .subcommand(Command::new("path").about("Print the settings file path"))
                .subcommand(Command::new("init").about("Write a settings file with defaults")),
        )
}

fn settings_store(matches: &ArgMatches) -> Result<FileSettingsStore> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(FileSettingsStore::new(path.clone())),
        None => Ok(FileSettingsStore::default_location()?),
    }
}

fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("run", sub_matches)) => {
            commands::run::execute(sub_matches, settings_store(sub_matches)?)?;
        }
        Some(("status", sub_matches)) => {
            commands::status::execute(sub_matches, &settings_store(sub_matches)?)?;
        }
        Some(("targets", sub_matches)) => {
            commands::targets::execute(sub_matches, &settings_store(sub_matches)?)?;
        }
        Some(("service", sub_matches)) => {
            commands::service::execute(sub_matches)?;
        }
        Some(("scan", sub_matches)) => {
            commands::scan::execute(sub_matches)?;
        }
        Some(("report", sub_matches)) => {
            commands::report::execute(sub_matches, &settings_store(sub_matches)?)?;
        }
        Some(("email", sub_matches)) => {
            commands::email::execute(sub_matches, &settings_store(sub_matches)?)?;
        }
        Some(("config", sub_matches)) => {
            commands::config::execute(sub_matches, &settings_store(sub_matches)?)?;
        }
        _ => {
            println!("Welcome to hostwatch!");
            println!("Use 'hostwatch --help' for more information.");
        }
    }

    Ok(())
}

use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};

use crate::core::monitor::snapshot::StatusSnapshot;
use crate::core::monitor::status::TargetStatus;
use crate::core::monitor::targets::MonitoredTarget;

/// Format a timestamp as `HH:MM:SS`
pub fn format_clock(time: &DateTime<Local>) -> String {
    time.format("%H:%M:%S").to_string()
}

pub fn colorize_status(status: TargetStatus) -> ColoredString {
    match status {
        TargetStatus::Running => status.as_str().green(),
        TargetStatus::Stopped | TargetStatus::NotRunning | TargetStatus::NotFound => {
            status.as_str().red()
        }
        TargetStatus::Unknown => status.as_str().yellow(),
    }
}

/// Percent value colored by load: green below 70, yellow below 90, red above
pub fn colorize_percent(value: f32) -> ColoredString {
    let text = format!("{:.1}%", value);
    if value >= 90.0 {
        text.red().bold()
    } else if value >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

/// One-line summary printed by the daemon after every cycle
pub fn summary_line(snapshot: &StatusSnapshot, at: &DateTime<Local>) -> String {
    let mut parts = vec![
        format!("CPU {}", colorize_percent(snapshot.cpu)),
        format!("RAM {}", colorize_percent(snapshot.ram)),
    ];
    for (device, percent) in &snapshot.disks {
        parts.push(format!("{} {}", device, colorize_percent(*percent)));
    }

    let total = snapshot.services.len() + snapshot.processes.len();
    let problems = snapshot.problems();
    if total > 0 {
        let running = total - problems.len();
        let counter = format!("{}/{} running", running, total);
        parts.push(if problems.is_empty() {
            counter.green().to_string()
        } else {
            counter.red().to_string()
        });
    }

    let mut line = format!(
        "{} {}",
        format!("[{}]", format_clock(at)).dimmed(),
        parts.join(" | ")
    );
    for (name, status) in problems {
        line.push_str(&format!("  {} {}", name.bold(), colorize_status(status)));
    }
    line
}

/// Full status table for `hostwatch status`
pub fn print_status(snapshot: &StatusSnapshot) {
    println!("{}", "Resources".white().bold());
    println!("  {:<24} {}", "CPU", colorize_percent(snapshot.cpu));
    println!("  {:<24} {}", "RAM", colorize_percent(snapshot.ram));
    for (device, percent) in &snapshot.disks {
        println!("  {:<24} {}", device, colorize_percent(*percent));
    }

    print_section("Services", &snapshot.services);
    print_section("Processes", &snapshot.processes);
}

fn print_section(title: &str, entries: &std::collections::BTreeMap<String, TargetStatus>) {
    println!();
    println!("{}", title.white().bold());
    if entries.is_empty() {
        println!("  {}", "none monitored".dimmed());
        return;
    }
    for (name, status) in entries {
        println!("  {:<24} {}", name, colorize_status(*status));
    }
}

pub fn print_targets(targets: &[MonitoredTarget]) {
    if targets.is_empty() {
        println!("{}", "No targets are monitored.".dimmed());
        return;
    }
    for target in targets {
        println!("  {:<10} {}", target.kind.to_string().cyan(), target.name);
    }
}

//! HTML bodies for alert and report mail.

use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};

use super::metrics::{DiskMetrics, HostMetrics, ProcessMetrics};
use super::reports::ReportKind;
use super::status::TargetStatus;
use super::targets::MonitoredTarget;
use super::thresholds::Overload;

pub const FOOTER: &str = "This is an automated message from hostwatch.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Uptime as `Nd HH:MM:SS`, days omitted when zero
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn wrap(inner: &str) -> String {
    format!(
        "<html>\n<body>\n{}<hr>\n<p>{}</p>\n</body>\n</html>\n",
        inner, FOOTER
    )
}

fn disk_line(disk: &DiskMetrics) -> String {
    format!(
        "{}: {:.1}% used, Free: {}",
        escape_html(&disk.device),
        disk.usage_percent,
        format_size(disk.available_bytes, BINARY)
    )
}

fn process_lines(processes: &[ProcessMetrics], cpu: bool) -> String {
    if processes.is_empty() {
        return "N/A".to_string();
    }

    processes
        .iter()
        .map(|p| {
            if cpu {
                format!("{}: {:.1}% CPU", escape_html(&p.name), p.cpu_usage_percent)
            } else {
                format!("{}: {:.2}% RAM", escape_html(&p.name), p.memory_percent)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn system_status_section(metrics: &HostMetrics) -> String {
    let disks = if metrics.disks.is_empty() {
        "N/A".to_string()
    } else {
        metrics
            .disks
            .iter()
            .map(disk_line)
            .collect::<Vec<_>>()
            .join("<br>")
    };
    let (one, five, fifteen) = metrics.load_average;

    format!(
        "<p><strong>System Status at the Time of Alert:</strong></p>\n<ul>\n\
         <li><strong>CPU Usage:</strong> {:.1}%</li>\n\
         <li><strong>RAM Usage:</strong> {:.1}% (Total: {}, Available: {})</li>\n\
         <li><strong>Disk Usage:</strong><br>{}</li>\n\
         <li><strong>Network Usage:</strong> Sent: {} bytes, Received: {} bytes</li>\n\
         <li><strong>Active Processes:</strong> {}</li>\n\
         <li><strong>System Uptime:</strong> {}</li>\n\
         <li><strong>Load Average (1, 5, 15 min):</strong> {:.2}, {:.2}, {:.2}</li>\n\
         </ul>\n<hr>\n\
         <p><strong>Top Processes by CPU Usage:</strong></p>\n<pre>{}</pre>\n\
         <p><strong>Top Processes by RAM Usage:</strong></p>\n<pre>{}</pre>\n",
        metrics.cpu_percent,
        metrics.memory.usage_percent,
        format_size(metrics.memory.total_bytes, BINARY),
        format_size(metrics.memory.available_bytes, BINARY),
        disks,
        metrics.network.bytes_sent,
        metrics.network.bytes_received,
        metrics.process_count,
        format_uptime(metrics.uptime_secs),
        one,
        five,
        fifteen,
        process_lines(&metrics.top_by_cpu, true),
        process_lines(&metrics.top_by_ram, false)
    )
}

/// Body for a service or process status change
pub fn status_change_body(
    target: &MonitoredTarget,
    previous: TargetStatus,
    current: TargetStatus,
    at: &DateTime<Local>,
    metrics: &HostMetrics,
) -> String {
    let kind = target.kind.to_string().to_lowercase();
    let name = escape_html(&target.name);

    let mut inner = format!(
        "<p><strong>Alert:</strong> The following {kind} has changed its status:</p>\n\
         <p><strong>Name:</strong> <strong>{name}</strong></p>\n\
         <p><strong>New Status:</strong> <strong>{current}</strong></p>\n\
         <p><strong>Previous Status:</strong> {previous}</p>\n\
         <p><strong>Description:</strong> The {kind} <strong>{name}</strong> is now in a <strong>{current}</strong> state.</p>\n\
         <p><strong>Timestamp:</strong> {}</p>\n<hr>\n",
        format_timestamp(at)
    );
    inner.push_str(&system_status_section(metrics));

    wrap(&inner)
}

/// Body for a CPU, RAM or disk threshold breach
pub fn overload_body(overload: &Overload, at: &DateTime<Local>, metrics: &HostMetrics) -> String {
    let subject = escape_html(&overload.subject);

    let mut inner = format!(
        "<h2>Hardware Overload Detected: {subject}</h2>\n\
         <p><strong>Alert Timestamp:</strong> {}</p>\n\
         <h3>Exceeded Threshold:</h3>\n<p>The {subject} has exceeded the threshold:</p>\n<ul>\n\
         <li><strong>Current Usage:</strong> {:.1}%</li>\n\
         <li><strong>Threshold:</strong> {}%</li>\n\
         <li><strong>Exceeded by:</strong> {:.1}%</li>\n</ul>\n<hr>\n",
        format_timestamp(at),
        overload.current,
        overload.threshold,
        overload.exceeded_by()
    );
    inner.push_str(&system_status_section(metrics));

    wrap(&inner)
}

/// Body for the report sent when a restart episode ends
pub fn restart_report_body(
    service: &str,
    succeeded: bool,
    attempts: u32,
    last_error: Option<&str>,
) -> String {
    let name = escape_html(service);
    let outcome = if succeeded { "Success" } else { "Failure" };

    let mut inner = if succeeded {
        format!(
            "<p>The service <strong>{}</strong> was successfully restarted on attempt {}.</p>\n",
            name, attempts
        )
    } else {
        format!(
            "<p>The service <strong>{}</strong> could not be restarted after {} attempt{}.</p>\n",
            name,
            attempts,
            if attempts == 1 { "" } else { "s" }
        )
    };
    inner.push_str(&format!(
        "<p><strong>Final Status:</strong> {}</p>\n<p><strong>Attempts:</strong> {}</p>\n",
        outcome, attempts
    ));
    if let Some(error) = last_error {
        inner.push_str(&format!(
            "<p><strong>Last Error:</strong> {}</p>\n",
            escape_html(error)
        ));
    }

    wrap(&inner)
}

/// Body for a daily, weekly, monthly or instant report
pub fn report_body(kind: ReportKind, at: &DateTime<Local>, metrics: &HostMetrics) -> String {
    let disks = metrics
        .disks
        .iter()
        .map(|d| format!("{}: {:.1}% used", escape_html(&d.device), d.usage_percent))
        .collect::<Vec<_>>()
        .join("<br>");

    let inner = format!(
        "<h2>{} System Report</h2>\n\
         <p><strong>Timestamp:</strong> {}</p>\n\
         <p><strong>CPU Usage:</strong> {:.1}%</p>\n\
         <p><strong>RAM Usage:</strong> {:.1}%</p>\n\
         <p><strong>System Uptime:</strong> {}</p>\n\
         <p><strong>Disk Usage:</strong><br>{}</p>\n",
        kind,
        format_timestamp(at),
        metrics.cpu_percent,
        metrics.memory.usage_percent,
        format_uptime(metrics.uptime_secs),
        disks
    );

    wrap(&inner)
}

//! Periodic report gate.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DAY_SECS: i64 = 86_400;
pub const WEEK_SECS: i64 = 604_800;
pub const MONTH_SECS: i64 = 2_592_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
    Instant,
}

impl ReportKind {
    pub fn subject(&self) -> String {
        format!("{} System Report", self)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Daily => write!(f, "Daily"),
            ReportKind::Weekly => write!(f, "Weekly"),
            ReportKind::Monthly => write!(f, "Monthly"),
            ReportKind::Instant => write!(f, "Instant"),
        }
    }
}

/// Decide whether a periodic report is due.
///
/// All cadences share one `last_report_time`. At most one report fires per
/// check; Daily wins over Weekly, Weekly over Monthly. Times are unix seconds.
pub fn maybe_generate_report(
    now: i64,
    last_report_time: i64,
    daily: bool,
    weekly: bool,
    monthly: bool,
) -> Option<ReportKind> {
    let elapsed = now.saturating_sub(last_report_time);

    if daily && elapsed >= DAY_SECS {
        Some(ReportKind::Daily)
    } else if weekly && elapsed >= WEEK_SECS {
        Some(ReportKind::Weekly)
    } else if monthly && elapsed >= MONTH_SECS {
        Some(ReportKind::Monthly)
    } else {
        None
    }
}

//! Last-known status per target and transition detection.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::targets::MonitoredTarget;
use crate::platform::services::ServiceState;

/// Closed set of statuses a target can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetStatus {
    #[serde(rename = "Running")]
    Running,
    #[serde(rename = "Stopped")]
    Stopped,
    #[serde(rename = "Not Running")]
    NotRunning,
    #[serde(rename = "Not Found")]
    NotFound,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Running => "Running",
            TargetStatus::Stopped => "Stopped",
            TargetStatus::NotRunning => "Not Running",
            TargetStatus::NotFound => "Not Found",
            TargetStatus::Unknown => "Unknown",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TargetStatus::Running)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ServiceState> for TargetStatus {
    fn from(state: ServiceState) -> Self {
        match state {
            ServiceState::Running => TargetStatus::Running,
            ServiceState::Stopped => TargetStatus::Stopped,
            ServiceState::NotFound => TargetStatus::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub target: MonitoredTarget,
    pub last_status: TargetStatus,
    pub last_changed_at: DateTime<Utc>,
}

/// A change of status between two consecutive observations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: MonitoredTarget,
    pub previous: TargetStatus,
    pub current: TargetStatus,
}

/// Holds one [`StatusRecord`] per target, mutated only by `observe`
#[derive(Debug, Default)]
pub struct StatusTracker {
    records: Mutex<HashMap<MonitoredTarget, StatusRecord>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh probe result and report whether it changed.
    ///
    /// The first observation of a target only seeds its record.
    pub fn observe(&self, target: &MonitoredTarget, status: TargetStatus) -> Option<Transition> {
        self.observe_at(target, status, Utc::now())
    }

    pub fn observe_at(
        &self,
        target: &MonitoredTarget,
        status: TargetStatus,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let mut records = self.records.lock();

        match records.get_mut(target) {
            None => {
                log::debug!("Baseline for {}: {}", target, status);
                records.insert(
                    target.clone(),
                    StatusRecord {
                        target: target.clone(),
                        last_status: status,
                        last_changed_at: now,
                    },
                );
                None
            }
            Some(record) if record.last_status == status => None,
            Some(record) => {
                let previous = record.last_status;
                record.last_status = status;
                record.last_changed_at = now;
                Some(Transition {
                    target: target.clone(),
                    previous,
                    current: status,
                })
            }
        }
    }

    /// Drop the record of a target that is no longer monitored
    pub fn forget(&self, target: &MonitoredTarget) -> bool {
        self.records.lock().remove(target).is_some()
    }

    pub fn status_of(&self, target: &MonitoredTarget) -> Option<TargetStatus> {
        self.records.lock().get(target).map(|r| r.last_status)
    }

    pub fn records(&self) -> Vec<StatusRecord> {
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by(|a, b| a.target.cmp(&b.target));
        records
    }
}

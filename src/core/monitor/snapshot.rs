//! Status snapshot shared with the presentation task and the status endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::status::TargetStatus;

/// Document served by `GET /status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub cpu: f32,
    pub ram: f32,
    /// Device -> percent used
    pub disks: BTreeMap<String, f32>,
    pub services: BTreeMap<String, TargetStatus>,
    pub processes: BTreeMap<String, TargetStatus>,
    #[serde(skip)]
    pub taken_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Targets that are not running, as `(name, status)`
    pub fn problems(&self) -> Vec<(&str, TargetStatus)> {
        self.services
            .iter()
            .chain(self.processes.iter())
            .filter(|(_, status)| !status.is_running())
            .map(|(name, status)| (name.as_str(), *status))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.taken_at.is_none()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub type SnapshotSender = watch::Sender<Arc<StatusSnapshot>>;
pub type SnapshotReceiver = watch::Receiver<Arc<StatusSnapshot>>;

/// Channel holding the latest snapshot, starting from an empty one
pub fn snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(Arc::new(StatusSnapshot::default()))
}

//! Registry of monitored services, processes and per-disk thresholds.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::config::Settings;
use crate::error::{HostwatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Service,
    Process,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Service => write!(f, "Service"),
            TargetKind::Process => write!(f, "Process"),
        }
    }
}

/// A named service or process under observation; unique by (name, kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub name: String,
    pub kind: TargetKind,
}

impl MonitoredTarget {
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Service,
        }
    }

    pub fn process(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Process,
        }
    }
}

impl fmt::Display for MonitoredTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    // Insertion order is the check order
    targets: Vec<MonitoredTarget>,
    disk_thresholds: BTreeMap<String, u8>,
}

/// Changes applied by [`TargetRegistry::sync_from_settings`]
#[derive(Debug, Default, PartialEq)]
pub struct RegistryDiff {
    pub added: Vec<MonitoredTarget>,
    pub removed: Vec<MonitoredTarget>,
}

/// Mutable set of monitored targets, written by user action, read by the poll task
#[derive(Debug, Default)]
pub struct TargetRegistry {
    state: RwLock<RegistryState>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let registry = Self::new();
        registry.sync_from_settings(settings);
        registry
    }

    /// Add a target; returns false if it was already monitored
    pub fn add(&self, target: MonitoredTarget) -> Result<bool> {
        if target.name.trim().is_empty() {
            return Err(HostwatchError::other("target name must not be empty"));
        }

        let mut state = self.state.write();
        if state.targets.contains(&target) {
            return Ok(false);
        }
        state.targets.push(target);
        Ok(true)
    }

    /// Remove a target; returns false if it was not monitored
    pub fn remove(&self, target: &MonitoredTarget) -> bool {
        let mut state = self.state.write();
        let before = state.targets.len();
        state.targets.retain(|t| t != target);
        state.targets.len() != before
    }

    pub fn contains(&self, target: &MonitoredTarget) -> bool {
        self.state.read().targets.contains(target)
    }

    pub fn targets(&self) -> Vec<MonitoredTarget> {
        self.state.read().targets.clone()
    }

    pub fn services(&self) -> Vec<MonitoredTarget> {
        self.of_kind(TargetKind::Service)
    }

    pub fn processes(&self) -> Vec<MonitoredTarget> {
        self.of_kind(TargetKind::Process)
    }

    fn of_kind(&self, kind: TargetKind) -> Vec<MonitoredTarget> {
        self.state
            .read()
            .targets
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    pub fn set_disk_threshold(&self, device: &str, percent: i64) -> Result<()> {
        if !(1..=100).contains(&percent) {
            return Err(HostwatchError::invalid_threshold(
                format!("disk {}", device),
                percent,
            ));
        }
        self.state
            .write()
            .disk_thresholds
            .insert(device.to_string(), percent as u8);
        Ok(())
    }

    pub fn clear_disk_threshold(&self, device: &str) -> bool {
        self.state.write().disk_thresholds.remove(device).is_some()
    }

    pub fn disk_thresholds(&self) -> BTreeMap<String, u8> {
        self.state.read().disk_thresholds.clone()
    }

    /// Make the registry mirror the persisted target lists and thresholds
    pub fn sync_from_settings(&self, settings: &Settings) -> RegistryDiff {
        let wanted: Vec<MonitoredTarget> = settings
            .monitoring
            .services
            .iter()
            .map(MonitoredTarget::service)
            .chain(
                settings
                    .monitoring
                    .processes
                    .iter()
                    .map(MonitoredTarget::process),
            )
            .filter(|t| !t.name.trim().is_empty())
            .collect();

        let mut state = self.state.write();
        let mut diff = RegistryDiff::default();

        for target in &state.targets {
            if !wanted.contains(target) {
                diff.removed.push(target.clone());
            }
        }
        for target in &wanted {
            if !state.targets.contains(target) {
                diff.added.push(target.clone());
            }
        }

        let mut deduped: Vec<MonitoredTarget> = Vec::with_capacity(wanted.len());
        for target in wanted {
            if !deduped.contains(&target) {
                deduped.push(target);
            }
        }
        state.targets = deduped;
        state.disk_thresholds = settings.hardware.disk_thresholds.clone();

        diff
    }

    /// Write the registry contents back into a settings snapshot
    pub fn write_to_settings(&self, settings: &mut Settings) {
        let state = self.state.read();
        settings.monitoring.services = state
            .targets
            .iter()
            .filter(|t| t.kind == TargetKind::Service)
            .map(|t| t.name.clone())
            .collect();
        settings.monitoring.processes = state
            .targets
            .iter()
            .filter(|t| t.kind == TargetKind::Process)
            .map(|t| t.name.clone())
            .collect();
        settings.hardware.disk_thresholds = state.disk_thresholds.clone();
    }
}

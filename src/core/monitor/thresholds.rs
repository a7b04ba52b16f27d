//! Threshold evaluation for CPU, RAM and per-disk usage.
//!
//! Evaluation is stateless: every tick is judged on its own, repeated firing
//! is policed by the dispatcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::config::HardwareSettings;

pub const CPU_SUBJECT: &str = "CPU Usage";
pub const RAM_SUBJECT: &str = "RAM Usage";

/// Subject used for a disk device, e.g. `Disk Space C:`
pub fn disk_subject(device: &str) -> String {
    format!("Disk Space {}", device)
}

/// Thresholds consulted by [`evaluate_hardware`], all in percent
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Thresholds {
    pub cpu: u8,
    pub ram: u8,
    pub disks: BTreeMap<String, u8>,
}

impl From<&HardwareSettings> for Thresholds {
    fn from(hardware: &HardwareSettings) -> Self {
        Self {
            cpu: hardware.cpu_threshold,
            ram: hardware.ram_threshold,
            disks: hardware.disk_thresholds.clone(),
        }
    }
}

/// A threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overload {
    pub subject: String,
    pub current: f32,
    pub threshold: u8,
}

impl Overload {
    pub fn exceeded_by(&self) -> f32 {
        self.current - self.threshold as f32
    }
}

fn breached(current: f32, threshold: u8) -> bool {
    current > threshold as f32
}

/// Compare live usage against thresholds.
///
/// `disks` holds `(device, percent)` for mounted partitions with a filesystem,
/// in enumeration order. Only devices with a configured threshold are checked.
/// The result is ordered CPU, RAM, then disks.
pub fn evaluate_hardware(
    cpu_percent: f32,
    ram_percent: f32,
    disks: &[(String, f32)],
    thresholds: &Thresholds,
) -> Vec<Overload> {
    let mut overloads = Vec::new();

    if breached(cpu_percent, thresholds.cpu) {
        overloads.push(Overload {
            subject: CPU_SUBJECT.to_string(),
            current: cpu_percent,
            threshold: thresholds.cpu,
        });
    }

    if breached(ram_percent, thresholds.ram) {
        overloads.push(Overload {
            subject: RAM_SUBJECT.to_string(),
            current: ram_percent,
            threshold: thresholds.ram,
        });
    }

    for (device, usage) in disks {
        let Some(&threshold) = thresholds.disks.get(device) else {
            continue;
        };
        if breached(*usage, threshold) {
            overloads.push(Overload {
                subject: disk_subject(device),
                current: *usage,
                threshold,
            });
        }
    }

    overloads
}

/// Every subject the evaluator could emit for these thresholds
pub fn watched_subjects(thresholds: &Thresholds) -> Vec<String> {
    let mut subjects = vec![CPU_SUBJECT.to_string(), RAM_SUBJECT.to_string()];
    subjects.extend(thresholds.disks.keys().map(|device| disk_subject(device)));
    subjects
}

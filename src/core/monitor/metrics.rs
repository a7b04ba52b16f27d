use serde::{Deserialize, Serialize};

/// Host-wide metrics captured once per cycle, attached to alert bodies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostMetrics {
    pub timestamp: i64, // Unix timestamp
    pub cpu_percent: f32,
    pub memory: MemoryMetrics,
    pub disks: Vec<DiskMetrics>,
    pub network: NetworkCounters,
    pub uptime_secs: u64,
    pub process_count: usize,
    pub load_average: (f64, f64, f64), // 1, 5, 15 min
    pub top_by_cpu: Vec<ProcessMetrics>,
    pub top_by_ram: Vec<ProcessMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f32,
}

/// A partition as enumerated by the host, mounted or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskPartition {
    pub device: String,
    pub mount_point: String,
    pub has_filesystem: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub device: String,
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub name: String,
    pub cpu_usage_percent: f32,
    pub memory_bytes: u64,
    pub memory_percent: f32,
}

/// Metric used to rank processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSort {
    Cpu,
    Memory,
}

/// Keep the `n` heaviest processes by the given metric, descending.
///
/// The sort is stable, so equal values keep the order they were enumerated in.
pub fn rank_processes(
    mut processes: Vec<ProcessMetrics>,
    by: ProcessSort,
    n: usize,
) -> Vec<ProcessMetrics> {
    let key = |p: &ProcessMetrics| match by {
        ProcessSort::Cpu => p.cpu_usage_percent,
        ProcessSort::Memory => p.memory_percent,
    };

    processes.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    processes.truncate(n);
    processes
}

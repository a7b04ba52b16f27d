//! Host state probing.
//!
//! [`HealthProbe`] is the seam between the monitor and the host. The poll task
//! calls [`HealthProbe::refresh`] once per cycle and then reads the sampled
//! values; service state is queried live from the service manager.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

use super::metrics::{
    rank_processes, DiskMetrics, DiskPartition, HostMetrics, MemoryMetrics, NetworkCounters,
    ProcessMetrics, ProcessSort,
};
use crate::error::Result;
use crate::platform::services::{self, ServiceState};

/// Number of processes listed in alert bodies
pub const TOP_PROCESS_COUNT: usize = 5;

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Take a fresh sample of host counters
    async fn refresh(&self) -> Result<()>;

    fn cpu_percent(&self) -> f32;

    fn memory(&self) -> MemoryMetrics;

    fn ram_percent(&self) -> f32 {
        self.memory().usage_percent
    }

    fn disk_partitions(&self) -> Vec<DiskPartition>;

    /// Usage of the partition mounted at `mount_point`, if it is still mounted
    fn disk_usage(&self, mount_point: &str) -> Option<DiskMetrics>;

    fn disk_usage_percent(&self, mount_point: &str) -> Option<f32> {
        self.disk_usage(mount_point).map(|d| d.usage_percent)
    }

    fn process_names(&self) -> HashSet<String>;

    fn process_count(&self) -> usize;

    fn top_processes_by_cpu(&self, n: usize) -> Vec<ProcessMetrics>;

    fn top_processes_by_ram(&self, n: usize) -> Vec<ProcessMetrics>;

    fn uptime_seconds(&self) -> u64;

    fn network_counters(&self) -> NetworkCounters;

    /// 1, 5 and 15 minute load; zero where the host has no such notion
    fn load_average(&self) -> (f64, f64, f64) {
        (0.0, 0.0, 0.0)
    }

    async fn service_status(&self, name: &str) -> Result<ServiceState>;

    async fn service_names(&self) -> Result<Vec<String>>;

    /// Usage of every partition that carries a filesystem, in enumeration order
    fn disk_usages(&self) -> Vec<DiskMetrics> {
        self.disk_partitions()
            .into_iter()
            .filter(|p| p.has_filesystem)
            .filter_map(|p| {
                self.disk_usage(&p.mount_point).map(|mut usage| {
                    usage.device = p.device;
                    usage
                })
            })
            .collect()
    }

    /// Compose the full host snapshot attached to alert bodies
    fn host_metrics(&self, top_n: usize) -> HostMetrics {
        HostMetrics {
            timestamp: chrono::Utc::now().timestamp(),
            cpu_percent: self.cpu_percent(),
            memory: self.memory(),
            disks: self.disk_usages(),
            network: self.network_counters(),
            uptime_secs: self.uptime_seconds(),
            process_count: self.process_count(),
            load_average: self.load_average(),
            top_by_cpu: self.top_processes_by_cpu(top_n),
            top_by_ram: self.top_processes_by_ram(top_n),
        }
    }
}

/// [`HealthProbe`] backed by `sysinfo` and the OS service manager
pub struct SysinfoProbe {
    system: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();
        system.refresh_processes(ProcessesToUpdate::All, true);

        Self {
            system: Mutex::new(system),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }

    fn processes(&self) -> Vec<ProcessMetrics> {
        let system = self.system.lock();
        let total_memory = system.total_memory();

        let mut processes: Vec<_> = system
            .processes()
            .values()
            .map(|proc| {
                let mem = proc.memory();
                ProcessMetrics {
                    pid: proc.pid().as_u32(),
                    name: proc.name().to_string_lossy().to_string(),
                    cpu_usage_percent: proc.cpu_usage(),
                    memory_bytes: mem,
                    memory_percent: if total_memory > 0 {
                        (mem as f32 / total_memory as f32) * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        // HashMap order is arbitrary; pid order makes ties deterministic
        processes.sort_by_key(|p| p.pid);
        processes
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn device_name(disk: &sysinfo::Disk) -> String {
    if cfg!(windows) {
        let mount = disk.mount_point().to_string_lossy().to_string();
        mount.trim_end_matches('\\').to_string()
    } else {
        disk.name().to_string_lossy().to_string()
    }
}

#[async_trait]
impl HealthProbe for SysinfoProbe {
    async fn refresh(&self) -> Result<()> {
        {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();
            system.refresh_processes(ProcessesToUpdate::All, true);
        }
        self.disks.lock().refresh(true);
        self.networks.lock().refresh(true);
        Ok(())
    }

    fn cpu_percent(&self) -> f32 {
        self.system.lock().global_cpu_usage()
    }

    fn memory(&self) -> MemoryMetrics {
        let system = self.system.lock();
        let total = system.total_memory();
        let used = system.used_memory();

        MemoryMetrics {
            total_bytes: total,
            available_bytes: system.available_memory(),
            usage_percent: if total > 0 {
                (used as f32 / total as f32) * 100.0
            } else {
                0.0
            },
        }
    }

    fn disk_partitions(&self) -> Vec<DiskPartition> {
        self.disks
            .lock()
            .iter()
            .map(|disk| DiskPartition {
                device: device_name(disk),
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                has_filesystem: !disk.file_system().is_empty(),
            })
            .collect()
    }

    fn disk_usage(&self, mount_point: &str) -> Option<DiskMetrics> {
        let disks = self.disks.lock();
        let disk = disks
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == mount_point)?;

        let total = disk.total_space();
        let available = disk.available_space();
        let used = total.saturating_sub(available);

        Some(DiskMetrics {
            device: device_name(disk),
            mount_point: mount_point.to_string(),
            total_bytes: total,
            available_bytes: available,
            usage_percent: if total > 0 {
                (used as f32 / total as f32) * 100.0
            } else {
                0.0
            },
        })
    }

    fn process_names(&self) -> HashSet<String> {
        self.system
            .lock()
            .processes()
            .values()
            .map(|proc| proc.name().to_string_lossy().to_string())
            .collect()
    }

    fn process_count(&self) -> usize {
        self.system.lock().processes().len()
    }

    fn top_processes_by_cpu(&self, n: usize) -> Vec<ProcessMetrics> {
        rank_processes(self.processes(), ProcessSort::Cpu, n)
    }

    fn top_processes_by_ram(&self, n: usize) -> Vec<ProcessMetrics> {
        rank_processes(self.processes(), ProcessSort::Memory, n)
    }

    fn uptime_seconds(&self) -> u64 {
        System::uptime()
    }

    fn network_counters(&self) -> NetworkCounters {
        self.networks
            .lock()
            .values()
            .fold(NetworkCounters::default(), |acc, data| NetworkCounters {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_received: acc.bytes_received + data.total_received(),
            })
    }

    fn load_average(&self) -> (f64, f64, f64) {
        let load = System::load_average();
        (load.one, load.five, load.fifteen)
    }

    async fn service_status(&self, name: &str) -> Result<ServiceState> {
        services::query_status(name).await
    }

    async fn service_names(&self) -> Result<Vec<String>> {
        services::list_services().await
    }
}

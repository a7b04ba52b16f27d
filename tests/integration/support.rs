//! In-memory collaborators for driving the poll scheduler end to end.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hostwatch::core::config::{Settings, SettingsStore};
use hostwatch::core::monitor::{
    DiskMetrics, DiskPartition, HealthProbe, MemoryMetrics, MonitorParts, NetworkCounters,
    Notifier, PollScheduler, ProcessMetrics, ServiceController,
};
use hostwatch::platform::ServiceState;
use hostwatch::{HostwatchError, Result};

#[derive(Default)]
struct HostState {
    cpu: f32,
    ram: f32,
    disks: Vec<(String, f32)>,
    processes: HashSet<String>,
    services: HashMap<String, ServiceState>,
    broken_services: HashSet<String>,
    refreshes: usize,
}

/// Host whose readings are set by the test
#[derive(Default)]
pub struct FakeProbe {
    state: Mutex<HostState>,
}

impl FakeProbe {
    pub fn set_cpu(&self, percent: f32) {
        self.state.lock().cpu = percent;
    }

    pub fn set_ram(&self, percent: f32) {
        self.state.lock().ram = percent;
    }

    pub fn set_disk(&self, device: &str, percent: f32) {
        let mut state = self.state.lock();
        state.disks.retain(|(d, _)| d != device);
        state.disks.push((device.to_string(), percent));
    }

    pub fn set_service(&self, name: &str, service: ServiceState) {
        self.state.lock().services.insert(name.to_string(), service);
    }

    /// Make status queries for a service fail
    pub fn break_service(&self, name: &str) {
        self.state.lock().broken_services.insert(name.to_string());
    }

    pub fn start_process(&self, name: &str) {
        self.state.lock().processes.insert(name.to_string());
    }

    pub fn kill_process(&self, name: &str) {
        self.state.lock().processes.remove(name);
    }

    /// One refresh happens per poll cycle
    pub fn refresh_count(&self) -> usize {
        self.state.lock().refreshes
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn refresh(&self) -> Result<()> {
        self.state.lock().refreshes += 1;
        Ok(())
    }

    fn cpu_percent(&self) -> f32 {
        self.state.lock().cpu
    }

    fn memory(&self) -> MemoryMetrics {
        let total = 8 * 1024 * 1024 * 1024u64;
        let ram = self.state.lock().ram;
        MemoryMetrics {
            total_bytes: total,
            available_bytes: (total as f64 * (1.0 - f64::from(ram) / 100.0)) as u64,
            usage_percent: ram,
        }
    }

    fn disk_partitions(&self) -> Vec<DiskPartition> {
        self.state
            .lock()
            .disks
            .iter()
            .map(|(device, _)| DiskPartition {
                device: device.clone(),
                mount_point: format!("/mnt/{}", device),
                has_filesystem: true,
            })
            .collect()
    }

    fn disk_usage(&self, mount_point: &str) -> Option<DiskMetrics> {
        let state = self.state.lock();
        let device = mount_point.strip_prefix("/mnt/")?;
        let (_, percent) = state.disks.iter().find(|(d, _)| d == device)?;
        Some(DiskMetrics {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            total_bytes: 100 * 1024 * 1024 * 1024,
            available_bytes: ((100.0 - percent) as u64) * 1024 * 1024 * 1024,
            usage_percent: *percent,
        })
    }

    fn process_names(&self) -> HashSet<String> {
        self.state.lock().processes.clone()
    }

    fn process_count(&self) -> usize {
        self.state.lock().processes.len()
    }

    fn top_processes_by_cpu(&self, _n: usize) -> Vec<ProcessMetrics> {
        Vec::new()
    }

    fn top_processes_by_ram(&self, _n: usize) -> Vec<ProcessMetrics> {
        Vec::new()
    }

    fn uptime_seconds(&self) -> u64 {
        3_600
    }

    fn network_counters(&self) -> NetworkCounters {
        NetworkCounters::default()
    }

    async fn service_status(&self, name: &str) -> Result<ServiceState> {
        let state = self.state.lock();
        if state.broken_services.contains(name) {
            return Err(HostwatchError::probe(format!("cannot query {}", name)));
        }
        Ok(state
            .services
            .get(name)
            .copied()
            .unwrap_or(ServiceState::NotFound))
    }

    async fn service_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().services.keys().cloned().collect())
    }
}

/// Service controller that follows a script of restart results.
///
/// A successful restart marks the service Running on the probe.
pub struct ScriptedController {
    probe: Arc<FakeProbe>,
    results: Mutex<VecDeque<bool>>,
    pub restarts: Mutex<Vec<String>>,
}

impl ScriptedController {
    pub fn new(probe: Arc<FakeProbe>, results: Vec<bool>) -> Self {
        Self {
            probe,
            results: Mutex::new(results.into_iter().collect()),
            restarts: Mutex::new(Vec::new()),
        }
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.lock().len()
    }
}

#[async_trait]
impl ServiceController for ScriptedController {
    async fn start(&self, name: &str) -> Result<()> {
        self.probe.set_service(name, ServiceState::Running);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.probe.set_service(name, ServiceState::Stopped);
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.restarts.lock().push(name.to_string());
        let ok = self.results.lock().pop_front().unwrap_or(false);
        if ok {
            self.probe.set_service(name, ServiceState::Running);
            Ok(())
        } else {
            Err(HostwatchError::service_control(format!(
                "access denied restarting {}",
                name
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Notifier that keeps every message it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.subject.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<()> {
        self.sent.lock().push(SentMail {
            subject: subject.to_string(),
            body: html_body.to_string(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}

/// Settings store with a generation counter standing in for a file mtime
pub struct MemoryStore {
    settings: Mutex<Settings>,
    generation: Mutex<u64>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            generation: Mutex::new(1),
        }
    }

    /// Simulate another process editing the settings file
    pub fn edit<F: FnOnce(&mut Settings)>(&self, change: F) {
        {
            let mut settings = self.settings.lock();
            change(&mut *settings);
        }
        *self.generation.lock() += 1;
    }

    pub fn current(&self) -> Settings {
        self.settings.lock().clone()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Settings {
        self.settings.lock().clone()
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.settings.lock() = settings.clone();
        *self.generation.lock() += 1;
        Ok(())
    }

    fn modified(&self) -> Option<SystemTime> {
        Some(UNIX_EPOCH + Duration::from_secs(*self.generation.lock()))
    }
}

/// Settings with one recipient and nothing monitored
pub fn base_settings() -> Settings {
    let mut settings = Settings::default();
    settings.email.from = "monitor@example.com".to_string();
    settings.email.to = vec!["ops@example.com".to_string()];
    settings.email.subject = "Alert".to_string();
    settings
}

pub struct Harness {
    pub probe: Arc<FakeProbe>,
    pub controller: Arc<ScriptedController>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<PollScheduler>,
}

impl Harness {
    pub fn new(settings: Settings, restart_results: Vec<bool>) -> Self {
        let probe = Arc::new(FakeProbe::default());
        let controller = Arc::new(ScriptedController::new(
            Arc::clone(&probe),
            restart_results,
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore::new(settings));

        let scheduler = Arc::new(PollScheduler::new(MonitorParts {
            store: store.clone(),
            probe: probe.clone(),
            controller: controller.clone(),
            notifier: notifier.clone(),
        }));

        Self {
            probe,
            controller,
            notifier,
            store,
            scheduler,
        }
    }
}

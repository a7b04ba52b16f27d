//! The poll loop.
//!
//! Every [`POLL_INTERVAL`] one cycle runs to completion: reload settings if
//! the store changed, sample the host, publish the status snapshot, then
//! check services, processes, hardware and reports in that order. Cycles
//! never overlap. Restart episodes run on their own tasks and are drained
//! when the loop shuts down.

use chrono::{DateTime, Local, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::control::ServiceController;
use super::dispatcher::{AlertDispatcher, AlertKey, DispatchOutcome};
use super::metrics::HostMetrics;
use super::notifier::Notifier;
use super::probe::{HealthProbe, TOP_PROCESS_COUNT};
use super::recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy};
use super::reports::{maybe_generate_report, ReportKind};
use super::snapshot::{snapshot_channel, SnapshotReceiver, SnapshotSender, StatusSnapshot};
use super::status::{StatusTracker, TargetStatus, Transition};
use super::targets::{MonitoredTarget, TargetKind, TargetRegistry};
use super::templates;
use super::thresholds::{evaluate_hardware, watched_subjects, Overload, Thresholds};
use crate::core::config::{Settings, SettingsStore};
use crate::error::Result;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Collaborators the scheduler is built from
pub struct MonitorParts {
    pub store: Arc<dyn SettingsStore>,
    pub probe: Arc<dyn HealthProbe>,
    pub controller: Arc<dyn ServiceController>,
    pub notifier: Arc<dyn Notifier>,
}

/// What one cycle observed and triggered
#[derive(Debug, Default)]
pub struct CycleReport {
    pub transitions: Vec<Transition>,
    pub overloads: Vec<Overload>,
    pub report: Option<ReportKind>,
    pub recoveries: Vec<JoinHandle<Option<RecoveryOutcome>>>,
}

pub struct PollScheduler {
    store: Arc<dyn SettingsStore>,
    probe: Arc<dyn HealthProbe>,
    registry: Arc<TargetRegistry>,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<AlertDispatcher>,
    recovery: Arc<RecoveryController>,
    settings: RwLock<Settings>,
    settings_stamp: Mutex<Option<SystemTime>>,
    snapshot_tx: SnapshotSender,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(parts: MonitorParts) -> Self {
        let settings = parts.store.load();
        let stamp = parts.store.modified();

        let registry = Arc::new(TargetRegistry::from_settings(&settings));
        let dispatcher = Arc::new(AlertDispatcher::new(
            parts.notifier,
            settings.email.clone(),
        ));
        let recovery = Arc::new(RecoveryController::new(
            parts.controller,
            Arc::clone(&dispatcher),
        ));
        let (snapshot_tx, _) = snapshot_channel();

        Self {
            store: parts.store,
            probe: parts.probe,
            registry,
            tracker: Arc::new(StatusTracker::new()),
            dispatcher,
            recovery,
            settings: RwLock::new(settings),
            settings_stamp: Mutex::new(stamp),
            snapshot_tx,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_tx.subscribe()
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    pub fn recovery(&self) -> &Arc<RecoveryController> {
        &self.recovery
    }

    /// Reload settings when the store reports a new modification stamp
    pub fn reload_settings_if_changed(&self) -> bool {
        let stamp = self.store.modified();
        {
            let mut current = self.settings_stamp.lock();
            if stamp.is_none() || *current == stamp {
                return false;
            }
            *current = stamp;
        }

        log::info!("Settings changed on disk, reloading");
        self.apply_settings(self.store.load());
        true
    }

    /// Make every component use a new settings snapshot
    pub fn apply_settings(&self, settings: Settings) {
        let diff = self.registry.sync_from_settings(&settings);
        for target in &diff.removed {
            self.tracker.forget(target);
            log::info!("No longer monitoring {}", target);
        }
        for target in &diff.added {
            log::info!("Now monitoring {}", target);
        }

        self.dispatcher.apply_settings(&settings.email);
        *self.settings.write() = settings;
    }

    /// Run until a shutdown signal arrives.
    ///
    /// An in-flight cycle always completes, and restart episodes started by
    /// any cycle are waited on before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        log::info!(
            "Monitoring {} target(s) every {}s",
            self.registry.targets().len(),
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut episodes: Vec<JoinHandle<Option<RecoveryOutcome>>> = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    log::info!("Poll scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    episodes.retain(|handle| !handle.is_finished());
                    episodes.extend(report.recoveries);
                }
            }
        }

        if !episodes.is_empty() {
            log::info!("Waiting for {} restart episode(s) to finish", episodes.len());
        }
        for handle in episodes {
            match handle.await {
                Ok(Some(outcome)) => log::debug!(
                    "Restart episode for '{}' ended after {} attempt(s)",
                    outcome.service,
                    outcome.attempts
                ),
                Ok(None) => {}
                Err(e) => log::warn!("Restart episode ended abnormally: {}", e),
            }
        }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// One full cycle with an explicit clock for rate limiting and reports
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        log::trace!("Cycle start");
        self.reload_settings_if_changed();
        let settings = self.settings();

        if let Err(e) = self.probe.refresh().await {
            log::warn!("Failed to refresh host metrics: {}", e);
        }

        let probe = self.probe.as_ref();
        let services = probe_services(probe, &self.registry).await;
        let processes = probe_processes(probe, &self.registry);
        let disks = disk_usages(probe);

        let snapshot = build_snapshot(probe, &services, &processes, &disks, now);
        self.snapshot_tx.send_replace(Arc::new(snapshot));

        let mut report = CycleReport::default();
        let mut metrics = None;

        self.check_targets(&services, &settings, now, &mut metrics, &mut report)
            .await;
        self.check_targets(&processes, &settings, now, &mut metrics, &mut report)
            .await;
        self.check_hardware(&disks, &settings, now, &mut metrics, &mut report)
            .await;
        report.report = self.check_reports(&settings, now).await;

        log::trace!("Cycle end");
        report
    }

    fn host_metrics<'a>(&self, cache: &'a mut Option<HostMetrics>) -> &'a HostMetrics {
        cache.get_or_insert_with(|| self.probe.host_metrics(TOP_PROCESS_COUNT))
    }

    async fn check_targets(
        &self,
        statuses: &[(MonitoredTarget, TargetStatus)],
        settings: &Settings,
        now: DateTime<Utc>,
        metrics: &mut Option<HostMetrics>,
        report: &mut CycleReport,
    ) {
        for (target, status) in statuses {
            // An unknown status is a failed probe, not a state change
            if *status == TargetStatus::Unknown {
                continue;
            }

            let Some(transition) = self.tracker.observe_at(target, *status, now) else {
                continue;
            };

            log::info!(
                "{} changed from {} to {}",
                target,
                transition.previous,
                transition.current
            );

            let body = templates::status_change_body(
                target,
                transition.previous,
                transition.current,
                &now.with_timezone(&Local),
                self.host_metrics(metrics),
            );
            let subject = format!("{} {}", target.kind, transition.current);
            self.dispatcher.deliver_now(&subject, &body).await;

            if target.kind == TargetKind::Service
                && transition.current == TargetStatus::Stopped
                && settings.hardware.auto_restart_service
            {
                let policy = RecoveryPolicy {
                    max_attempts: settings.hardware.max_restart_attempts,
                    repeat_allowed: settings.email.send_repeat_email,
                    frequency_minutes: settings.email.frequency_minutes,
                };
                if let Some(handle) = self.recovery.spawn_episode(target.name.clone(), policy) {
                    report.recoveries.push(handle);
                }
            }

            report.transitions.push(transition);
        }
    }

    async fn check_hardware(
        &self,
        disks: &[(String, f32)],
        settings: &Settings,
        now: DateTime<Utc>,
        metrics: &mut Option<HostMetrics>,
        report: &mut CycleReport,
    ) {
        let thresholds = Thresholds::from(&settings.hardware);
        let overloads = evaluate_hardware(
            self.probe.cpu_percent(),
            self.probe.ram_percent(),
            disks,
            &thresholds,
        );

        for subject in watched_subjects(&thresholds) {
            if !overloads.iter().any(|o| o.subject == subject) {
                self.dispatcher.resolve(&AlertKey::new(subject));
            }
        }

        for overload in &overloads {
            log::debug!(
                "{} at {:.1}% exceeds {}%",
                overload.subject,
                overload.current,
                overload.threshold
            );
            let body =
                templates::overload_body(overload, &now.with_timezone(&Local), self.host_metrics(metrics));
            self.dispatcher
                .notify_at(
                    now,
                    &AlertKey::new(overload.subject.clone()),
                    &format!("Hardware Overload: {}", overload.subject),
                    &body,
                    settings.email.send_repeat_email,
                    settings.email.frequency_minutes,
                )
                .await;
        }

        report.overloads = overloads;
    }

    async fn check_reports(&self, settings: &Settings, now: DateTime<Utc>) -> Option<ReportKind> {
        let reports = &settings.reports;
        if !reports.report_active {
            return None;
        }

        let kind = maybe_generate_report(
            now.timestamp(),
            reports.last_report_time,
            reports.daily,
            reports.weekly,
            reports.monthly,
        )?;

        log::info!("Sending {} report", kind);
        send_report(&self.dispatcher, self.probe.as_ref(), kind, now).await;

        if let Err(e) = self.record_report_time(now.timestamp()) {
            log::error!("Failed to persist report time: {}", e);
        }
        Some(kind)
    }

    /// Persist `last_report_time` on top of whatever is currently stored
    fn record_report_time(&self, timestamp: i64) -> Result<()> {
        // Apply edits made since the cycle started before the stamp moves past them
        self.reload_settings_if_changed();
        self.settings.write().reports.last_report_time = timestamp;

        let mut stored = self.store.load();
        stored.reports.last_report_time = timestamp;
        self.store.save(&stored)?;

        // Our own write is not an external change
        *self.settings_stamp.lock() = self.store.modified();
        Ok(())
    }
}

type Statuses = Vec<(MonitoredTarget, TargetStatus)>;

/// Query every monitored service; a failed query reads as `Unknown`
async fn probe_services(probe: &dyn HealthProbe, registry: &TargetRegistry) -> Statuses {
    let mut statuses = Vec::new();
    for target in registry.services() {
        let status = match probe.service_status(&target.name).await {
            Ok(state) => TargetStatus::from(state),
            Err(e) => {
                log::warn!("Could not query service '{}': {}", target.name, e);
                TargetStatus::Unknown
            }
        };
        statuses.push((target, status));
    }
    statuses
}

fn probe_processes(probe: &dyn HealthProbe, registry: &TargetRegistry) -> Statuses {
    let running = probe.process_names();
    registry
        .processes()
        .into_iter()
        .map(|target| {
            let status = if running.contains(&target.name) {
                TargetStatus::Running
            } else {
                TargetStatus::NotRunning
            };
            (target, status)
        })
        .collect()
}

fn disk_usages(probe: &dyn HealthProbe) -> Vec<(String, f32)> {
    probe
        .disk_usages()
        .into_iter()
        .map(|d| (d.device, d.usage_percent))
        .collect()
}

fn build_snapshot(
    probe: &dyn HealthProbe,
    services: &[(MonitoredTarget, TargetStatus)],
    processes: &[(MonitoredTarget, TargetStatus)],
    disks: &[(String, f32)],
    now: DateTime<Utc>,
) -> StatusSnapshot {
    let to_map = |entries: &[(MonitoredTarget, TargetStatus)]| -> BTreeMap<String, TargetStatus> {
        entries
            .iter()
            .map(|(target, status)| (target.name.clone(), *status))
            .collect()
    };

    StatusSnapshot {
        cpu: probe.cpu_percent(),
        ram: probe.ram_percent(),
        disks: disks.iter().cloned().collect(),
        services: to_map(services),
        processes: to_map(processes),
        taken_at: Some(now),
    }
}

/// Sample the host once for the given targets, outside the poll loop
pub async fn collect_snapshot(
    probe: &dyn HealthProbe,
    registry: &TargetRegistry,
    now: DateTime<Utc>,
) -> StatusSnapshot {
    let services = probe_services(probe, registry).await;
    let processes = probe_processes(probe, registry);
    let disks = disk_usages(probe);
    build_snapshot(probe, &services, &processes, &disks, now)
}

/// Render and send a report without any gating
pub async fn send_report(
    dispatcher: &AlertDispatcher,
    probe: &dyn HealthProbe,
    kind: ReportKind,
    now: DateTime<Utc>,
) -> DispatchOutcome {
    let metrics = probe.host_metrics(TOP_PROCESS_COUNT);
    let body = templates::report_body(kind, &now.with_timezone(&Local), &metrics);
    dispatcher.deliver_now(&kind.subject(), &body).await
}

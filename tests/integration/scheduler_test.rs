use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

use hostwatch::core::config::Settings;
use hostwatch::core::monitor::{
    AlertKey, MonitorParts, MonitoredTarget, Notifier, PollScheduler, ReportKind, TargetStatus,
};
use hostwatch::platform::ServiceState;
use hostwatch::Result;

use super::support::{
    base_settings, FakeProbe, Harness, MemoryStore, RecordingNotifier, ScriptedController,
};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn test_first_cycle_only_seeds_baseline() {
    let mut settings = base_settings();
    settings.monitoring.services = vec!["Printer".to_string()];
    settings.monitoring.processes = vec!["nginx".to_string()];
    let h = Harness::new(settings, vec![]);
    h.probe.set_service("Printer", ServiceState::Stopped);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert!(report.transitions.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(
        h.scheduler
            .tracker()
            .status_of(&MonitoredTarget::process("nginx")),
        Some(TargetStatus::NotRunning)
    );
}

#[tokio::test]
async fn test_cpu_overload_is_delivered_immediately() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.set_cpu(92.0);
    h.probe.set_ram(40.0);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert_eq!(report.overloads.len(), 1);
    assert_eq!(report.overloads[0].subject, "CPU Usage");
    assert_eq!(report.overloads[0].current, 92.0);
    assert_eq!(report.overloads[0].threshold, 80);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[Alert] Hardware Overload: CPU Usage");
    assert_eq!(sent[0].recipients, vec!["ops@example.com".to_string()]);
    assert!(sent[0].body.contains("92.0%"));
    assert_eq!(
        h.scheduler
            .dispatcher()
            .last_sent(&AlertKey::new("CPU Usage")),
        Some(t0())
    );
}

#[tokio::test]
async fn test_value_at_threshold_does_not_fire() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.set_cpu(80.0);
    h.probe.set_ram(80.0);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert!(report.overloads.is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_continuous_overload_sends_once_without_repeat() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.set_cpu(95.0);

    // 40 minutes of cycles, one every 5 seconds
    for tick in 0..480 {
        h.scheduler
            .run_cycle_at(t0() + Duration::seconds(tick * 5))
            .await;
    }

    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_slow_cycles_do_not_reopen_the_overload() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.set_cpu(95.0);

    // 40 minutes of cycles stretched to 20 seconds apart
    for tick in 0..120 {
        h.scheduler
            .run_cycle_at(t0() + Duration::seconds(tick * 20))
            .await;
    }

    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_continuous_overload_repeats_after_window() {
    let mut settings = base_settings();
    settings.email.send_repeat_email = true;
    let h = Harness::new(settings, vec![]);
    h.probe.set_cpu(95.0);

    for tick in 0..480 {
        h.scheduler
            .run_cycle_at(t0() + Duration::seconds(tick * 5))
            .await;
    }

    // t0 and t0 + 30 minutes
    assert_eq!(h.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_new_overload_after_recovery_waits_for_window() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.set_cpu(95.0);
    h.scheduler.run_cycle_at(t0()).await;

    h.probe.set_cpu(10.0);
    h.scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;

    // Back above the threshold inside the window
    h.probe.set_cpu(95.0);
    h.scheduler
        .run_cycle_at(t0() + Duration::minutes(10))
        .await;
    assert_eq!(h.notifier.sent().len(), 1);

    h.probe.set_cpu(10.0);
    h.scheduler
        .run_cycle_at(t0() + Duration::minutes(20))
        .await;
    h.probe.set_cpu(95.0);
    h.scheduler
        .run_cycle_at(t0() + Duration::minutes(31))
        .await;
    assert_eq!(h.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_disk_threshold_alert() {
    let mut settings = base_settings();
    settings
        .hardware
        .disk_thresholds
        .insert("sda1".to_string(), 90);
    let h = Harness::new(settings, vec![]);
    h.probe.set_disk("sda1", 95.5);
    h.probe.set_disk("sdb1", 99.0);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert_eq!(report.overloads.len(), 1);
    assert_eq!(
        h.notifier.subjects(),
        vec!["[Alert] Hardware Overload: Disk Space sda1".to_string()]
    );
}

#[tokio::test]
async fn test_process_transition_always_notifies() {
    let mut settings = base_settings();
    settings.monitoring.processes = vec!["nginx".to_string()];
    let h = Harness::new(settings, vec![]);
    h.probe.start_process("nginx");

    h.scheduler.run_cycle_at(t0()).await;
    h.probe.kill_process("nginx");
    let report = h
        .scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;

    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].previous, TargetStatus::Running);
    assert_eq!(report.transitions[0].current, TargetStatus::NotRunning);

    h.probe.start_process("nginx");
    h.scheduler
        .run_cycle_at(t0() + Duration::seconds(10))
        .await;
    h.probe.kill_process("nginx");
    h.scheduler
        .run_cycle_at(t0() + Duration::seconds(15))
        .await;

    // Status changes bypass the frequency window
    assert_eq!(
        h.notifier.subjects(),
        vec![
            "[Alert] Process Not Running".to_string(),
            "[Alert] Process Running".to_string(),
            "[Alert] Process Not Running".to_string(),
        ]
    );
    assert!(h.notifier.sent()[0].body.contains("nginx"));
}

#[tokio::test]
async fn test_failed_service_query_is_not_a_transition() {
    let mut settings = base_settings();
    settings.monitoring.services = vec!["Printer".to_string()];
    let h = Harness::new(settings, vec![]);
    h.probe.set_service("Printer", ServiceState::Running);
    h.scheduler.run_cycle_at(t0()).await;

    h.probe.break_service("Printer");
    let mut snapshots = h.scheduler.subscribe();
    let report = h
        .scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;

    assert!(report.transitions.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(
        snapshots.borrow_and_update().services.get("Printer"),
        Some(&TargetStatus::Unknown)
    );
}

#[tokio::test]
async fn test_snapshot_is_published_each_cycle() {
    let mut settings = base_settings();
    settings.monitoring.processes = vec!["nginx".to_string()];
    let h = Harness::new(settings, vec![]);
    h.probe.set_cpu(42.0);
    h.probe.set_disk("sda1", 61.0);
    let mut snapshots = h.scheduler.subscribe();

    h.scheduler.run_cycle_at(t0()).await;

    assert!(snapshots.has_changed().unwrap());
    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.cpu, 42.0);
    assert_eq!(snapshot.disks.get("sda1"), Some(&61.0));
    assert_eq!(
        snapshot.processes.get("nginx"),
        Some(&TargetStatus::NotRunning)
    );
    assert_eq!(snapshot.taken_at, Some(t0()));
}

#[tokio::test]
async fn test_daily_report_fires_and_is_persisted() {
    let mut settings = base_settings();
    settings.reports.report_active = true;
    settings.reports.daily = true;
    settings.reports.weekly = true;
    settings.reports.last_report_time = t0().timestamp() - 90_000;
    let h = Harness::new(settings, vec![]);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert_eq!(report.report, Some(ReportKind::Daily));
    assert_eq!(
        h.notifier.subjects(),
        vec!["[Alert] Daily System Report".to_string()]
    );
    assert_eq!(h.store.current().reports.last_report_time, t0().timestamp());

    let next = h
        .scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;
    assert_eq!(next.report, None);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_inactive_reports_never_fire() {
    let mut settings = base_settings();
    settings.reports.daily = true;
    let h = Harness::new(settings, vec![]);

    let report = h.scheduler.run_cycle_at(t0()).await;

    assert_eq!(report.report, None);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_settings_edits_apply_on_next_cycle() {
    let h = Harness::new(base_settings(), vec![]);
    h.probe.start_process("nginx");
    h.scheduler.run_cycle_at(t0()).await;

    h.store.edit(|s| {
        s.monitoring.processes.push("nginx".to_string());
        s.email.subject = "Prod".to_string();
        s.hardware.cpu_threshold = 50;
    });
    h.probe.set_cpu(60.0);
    h.scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;

    let target = MonitoredTarget::process("nginx");
    assert!(h.scheduler.registry().contains(&target));
    assert_eq!(
        h.scheduler.tracker().status_of(&target),
        Some(TargetStatus::Running)
    );
    assert_eq!(
        h.notifier.subjects(),
        vec!["[Prod] Hardware Overload: CPU Usage".to_string()]
    );

    h.store.edit(|s| s.monitoring.processes.clear());
    h.scheduler
        .run_cycle_at(t0() + Duration::seconds(10))
        .await;
    assert!(!h.scheduler.registry().contains(&target));
    assert_eq!(h.scheduler.tracker().status_of(&target), None);
}

/// Edits the settings store while a mail is being sent
struct EditingNotifier {
    store: Arc<MemoryStore>,
    inner: RecordingNotifier,
}

#[async_trait]
impl Notifier for EditingNotifier {
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<()> {
        self.store.edit(|s| {
            s.monitoring.processes = vec!["nginx".to_string()];
            s.hardware.cpu_threshold = 60;
        });
        self.inner.send(subject, html_body, recipients).await
    }
}

#[tokio::test]
async fn test_edit_during_report_send_is_applied() {
    let mut settings: Settings = base_settings();
    settings.reports.report_active = true;
    settings.reports.daily = true;
    settings.reports.last_report_time = t0().timestamp() - 90_000;

    let probe = Arc::new(FakeProbe::default());
    let store = Arc::new(MemoryStore::new(settings));
    let notifier = Arc::new(EditingNotifier {
        store: store.clone(),
        inner: RecordingNotifier::default(),
    });
    let scheduler = PollScheduler::new(MonitorParts {
        store: store.clone(),
        probe: probe.clone(),
        controller: Arc::new(ScriptedController::new(probe.clone(), vec![])),
        notifier: notifier.clone(),
    });

    let report = scheduler.run_cycle_at(t0()).await;
    assert_eq!(report.report, Some(ReportKind::Daily));

    // Both the edit and the report time survive, in memory and in the store
    let running = scheduler.settings();
    assert_eq!(running.hardware.cpu_threshold, 60);
    assert_eq!(running.reports.last_report_time, t0().timestamp());
    assert!(scheduler
        .registry()
        .contains(&MonitoredTarget::process("nginx")));

    let stored = store.current();
    assert_eq!(stored.hardware.cpu_threshold, 60);
    assert_eq!(stored.reports.last_report_time, t0().timestamp());

    // The next cycle runs on the edited thresholds
    probe.set_cpu(70.0);
    let next = scheduler
        .run_cycle_at(t0() + Duration::seconds(5))
        .await;
    assert_eq!(next.overloads.len(), 1);
    assert_eq!(next.overloads[0].threshold, 60);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_polling_after_shutdown() {
    let h = Harness::new(base_settings(), vec![]);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let running = tokio::spawn(Arc::clone(&h.scheduler).run(shutdown_rx));

    // Ticks at 0s, 5s and 10s
    tokio::time::sleep(std::time::Duration::from_secs(12)).await;
    assert_eq!(h.probe.refresh_count(), 3);

    shutdown_tx.send(()).unwrap();
    running.await.unwrap();
    let stopped_at = h.probe.refresh_count();
    assert_eq!(stopped_at, 3);

    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    assert_eq!(h.probe.refresh_count(), stopped_at);
}

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

use hostwatch::core::monitor::{RecoveryState, TargetStatus};
use hostwatch::platform::ServiceState;

use super::support::{base_settings, Harness};

fn printer_harness(max_attempts: u32, restart_results: Vec<bool>) -> Harness {
    let mut settings = base_settings();
    settings.monitoring.services = vec!["Printer".to_string()];
    settings.hardware.auto_restart_service = true;
    settings.hardware.max_restart_attempts = max_attempts;
    let h = Harness::new(settings, restart_results);
    h.probe.set_service("Printer", ServiceState::Running);
    h
}

#[tokio::test(start_paused = true)]
async fn test_stopped_printer_is_restarted() {
    let h = printer_harness(1, vec![true]);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    h.scheduler.run_cycle_at(t0).await;
    h.probe.set_service("Printer", ServiceState::Stopped);
    let mut report = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(5))
        .await;

    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].current, TargetStatus::Stopped);
    assert_eq!(report.recoveries.len(), 1);

    let outcome = report
        .recoveries
        .remove(0)
        .await
        .unwrap()
        .expect("episode ran");
    assert_eq!(outcome.state, RecoveryState::Succeeded);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(h.controller.restart_count(), 1);

    let restart_reports: Vec<_> = h
        .notifier
        .sent()
        .into_iter()
        .filter(|m| m.subject.contains("Service Restart"))
        .collect();
    assert_eq!(restart_reports.len(), 1);
    assert_eq!(
        restart_reports[0].subject,
        "[Alert] Service Restart Success: Printer (1 attempt)"
    );
    assert!(restart_reports[0].body.contains("on attempt 1"));

    // The restarted service is seen running on the next cycle
    let next = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(10))
        .await;
    assert_eq!(next.transitions[0].current, TargetStatus::Running);
    assert!(next.recoveries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_gives_up_after_max_attempts() {
    let h = printer_harness(3, vec![false, false, false]);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    h.scheduler.run_cycle_at(t0).await;
    h.probe.set_service("Printer", ServiceState::Stopped);
    let mut report = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(5))
        .await;

    let outcome = report
        .recoveries
        .remove(0)
        .await
        .unwrap()
        .expect("episode ran");

    assert_eq!(outcome.state, RecoveryState::Exhausted);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(h.controller.restart_count(), 3);
    assert!(outcome.last_error.unwrap().contains("access denied"));
    assert!(h
        .notifier
        .subjects()
        .contains(&"[Alert] Service Restart Failure: Printer (3 attempts)".to_string()));
    assert_eq!(
        h.scheduler.recovery().state_of("Printer"),
        RecoveryState::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_restart_when_auto_restart_is_off() {
    let mut settings = base_settings();
    settings.monitoring.services = vec!["Printer".to_string()];
    let h = Harness::new(settings, vec![true]);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    h.probe.set_service("Printer", ServiceState::Running);

    h.scheduler.run_cycle_at(t0).await;
    h.probe.set_service("Printer", ServiceState::Stopped);
    let report = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(5))
        .await;

    assert!(report.recoveries.is_empty());
    assert_eq!(h.controller.restart_count(), 0);
    assert_eq!(
        h.notifier.subjects(),
        vec!["[Alert] Service Stopped".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_poll_cycles_continue_during_recovery() {
    let h = printer_harness(3, vec![false, false, true]);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    h.scheduler.run_cycle_at(t0).await;
    h.probe.set_service("Printer", ServiceState::Stopped);
    let mut report = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(5))
        .await;
    tokio::task::yield_now().await;

    // Episode is sleeping between attempts; a cycle still completes
    assert!(h.scheduler.recovery().is_recovering("Printer"));
    h.probe.set_cpu(99.0);
    let during = h
        .scheduler
        .run_cycle_at(t0 + Duration::seconds(10))
        .await;
    assert_eq!(during.overloads.len(), 1);
    assert!(during.recoveries.is_empty());

    let outcome = report.recoveries.remove(0).await.unwrap().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_restart_episode() {
    let h = printer_harness(3, vec![false, false, false]);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let running = tokio::spawn(Arc::clone(&h.scheduler).run(shutdown_rx));

    // The tick at 0s sees Printer running, the one at 5s sees it stopped
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    h.probe.set_service("Printer", ServiceState::Stopped);
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;

    // First attempt failed; the episode is in its backoff
    assert!(h.scheduler.recovery().is_recovering("Printer"));
    assert_eq!(h.controller.restart_count(), 1);

    shutdown_tx.send(()).unwrap();
    running.await.unwrap();

    assert_eq!(h.controller.restart_count(), 3);
    assert!(!h.scheduler.recovery().is_recovering("Printer"));
    assert_eq!(
        h.notifier.subjects(),
        vec![
            "[Alert] Service Stopped".to_string(),
            "[Alert] Service Restart Failure: Printer (3 attempts)".to_string(),
        ]
    );
}

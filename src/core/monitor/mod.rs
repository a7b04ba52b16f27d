//! Host and service health monitoring.
//!
//! The poll scheduler drives everything else: it samples the host through a
//! [`HealthProbe`], diffs target status in the [`StatusTracker`], evaluates
//! hardware thresholds and hands alerts to the [`AlertDispatcher`]. Stopped
//! services may be handed to the [`RecoveryController`].

pub mod control;
pub mod dispatcher;
pub mod metrics;
pub mod notifier;
pub mod probe;
pub mod recovery;
pub mod reports;
pub mod scheduler;
pub mod snapshot;
pub mod status;
pub mod targets;
pub mod templates;
pub mod thresholds;

pub use control::{ServiceController, SystemServiceController};
pub use dispatcher::{AlertDispatcher, AlertKey, DispatchOutcome, LastSentRecord};
pub use metrics::{DiskMetrics, DiskPartition, HostMetrics, MemoryMetrics, NetworkCounters, ProcessMetrics};
pub use notifier::{LogNotifier, Notifier, SmtpNotifier};
pub use probe::{HealthProbe, SysinfoProbe};
pub use recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy, RecoveryState, RestartAttempt};
pub use reports::{maybe_generate_report, ReportKind};
pub use scheduler::{collect_snapshot, send_report, CycleReport, MonitorParts, PollScheduler, POLL_INTERVAL};
pub use snapshot::{snapshot_channel, SnapshotReceiver, StatusSnapshot};
pub use status::{StatusRecord, StatusTracker, TargetStatus, Transition};
pub use targets::{MonitoredTarget, TargetKind, TargetRegistry};
pub use thresholds::{evaluate_hardware, Overload, Thresholds};

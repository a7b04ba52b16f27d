//! Bounded service restart episodes.
//!
//! An episode starts when a monitored service is seen stopping with
//! auto-restart enabled. It restarts the service up to `max_attempts` times,
//! sleeping a fixed backoff between failures, then reports the outcome and
//! forgets the episode. Only one episode per service runs at a time.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::control::ServiceController;
use super::dispatcher::{AlertDispatcher, AlertKey, DispatchOutcome};
use super::templates;

/// Pause between two failed restart attempts
pub const RESTART_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryState {
    Idle,
    Attempting(u32),
    Succeeded,
    Exhausted,
}

/// Live counter of an in-flight episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartAttempt {
    pub service: String,
    pub attempts_made: u32,
    pub max_attempts: u32,
}

/// Settings an episode runs with, taken from the cycle's snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub max_attempts: u32,
    pub repeat_allowed: bool,
    pub frequency_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub service: String,
    /// `Succeeded` or `Exhausted`
    pub state: RecoveryState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub report: DispatchOutcome,
}

impl RecoveryOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RecoveryState::Succeeded
    }
}

/// Rate-limiting key of the restart report for a service
pub fn restart_key(service: &str) -> AlertKey {
    AlertKey::new(format!("Service Restart {}", service))
}

pub fn restart_subject(service: &str, succeeded: bool, attempts: u32) -> String {
    let outcome = if succeeded { "Success" } else { "Failure" };
    format!(
        "Service Restart {}: {} ({} attempt{})",
        outcome,
        service,
        attempts,
        if attempts == 1 { "" } else { "s" }
    )
}

pub struct RecoveryController {
    controller: Arc<dyn ServiceController>,
    dispatcher: Arc<AlertDispatcher>,
    backoff: Duration,
    episodes: Mutex<HashMap<String, RestartAttempt>>,
}

/// Removes the episode entry however the episode ends
struct EpisodeGuard<'a> {
    episodes: &'a Mutex<HashMap<String, RestartAttempt>>,
    service: String,
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        self.episodes.lock().remove(&self.service);
    }
}

impl RecoveryController {
    pub fn new(controller: Arc<dyn ServiceController>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            controller,
            dispatcher,
            backoff: RESTART_BACKOFF,
            episodes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state_of(&self, service: &str) -> RecoveryState {
        match self.episodes.lock().get(service) {
            Some(attempt) => RecoveryState::Attempting(attempt.attempts_made + 1),
            None => RecoveryState::Idle,
        }
    }

    pub fn is_recovering(&self, service: &str) -> bool {
        self.episodes.lock().contains_key(service)
    }

    pub fn episodes(&self) -> Vec<RestartAttempt> {
        let mut episodes: Vec<_> = self.episodes.lock().values().cloned().collect();
        episodes.sort_by(|a, b| a.service.cmp(&b.service));
        episodes
    }

    fn begin(&self, service: &str, max_attempts: u32) -> Option<EpisodeGuard<'_>> {
        let mut episodes = self.episodes.lock();
        if episodes.contains_key(service) {
            return None;
        }
        episodes.insert(
            service.to_string(),
            RestartAttempt {
                service: service.to_string(),
                attempts_made: 0,
                max_attempts,
            },
        );
        Some(EpisodeGuard {
            episodes: &self.episodes,
            service: service.to_string(),
        })
    }

    fn record_attempt(&self, service: &str, attempts_made: u32) {
        if let Some(episode) = self.episodes.lock().get_mut(service) {
            episode.attempts_made = attempts_made;
        }
    }

    /// Run one episode to completion on the current task.
    ///
    /// Returns `None` without doing anything if an episode for this service
    /// is already in flight.
    pub async fn run_episode(
        &self,
        service: &str,
        policy: RecoveryPolicy,
    ) -> Option<RecoveryOutcome> {
        let max_attempts = policy.max_attempts.max(1);
        let _guard = self.begin(service, max_attempts)?;

        let key = restart_key(service);
        self.dispatcher.resolve(&key);

        log::info!(
            "Attempting to restart service '{}' (up to {} attempts)",
            service,
            max_attempts
        );

        let mut attempts = 0;
        let mut last_error = None;
        let succeeded = loop {
            attempts += 1;
            let result = self.controller.restart(service).await;
            self.record_attempt(service, attempts);

            match result {
                Ok(()) => {
                    log::info!("Service '{}' restarted on attempt {}", service, attempts);
                    break true;
                }
                Err(e) => {
                    log::warn!(
                        "Restart attempt {}/{} for '{}' failed: {}",
                        attempts,
                        max_attempts,
                        service,
                        e
                    );
                    last_error = Some(e.to_string());
                    if attempts >= max_attempts {
                        break false;
                    }
                    tokio::time::sleep(self.backoff).await;
                }
            }
        };

        let state = if succeeded {
            RecoveryState::Succeeded
        } else {
            log::error!(
                "Giving up on service '{}' after {} attempts",
                service,
                attempts
            );
            RecoveryState::Exhausted
        };

        let body = templates::restart_report_body(
            service,
            succeeded,
            attempts,
            if succeeded { None } else { last_error.as_deref() },
        );
        let report = self
            .dispatcher
            .notify(
                &key,
                &restart_subject(service, succeeded, attempts),
                &body,
                policy.repeat_allowed,
                policy.frequency_minutes,
            )
            .await;

        Some(RecoveryOutcome {
            service: service.to_string(),
            state,
            attempts,
            last_error,
            report,
        })
    }

    /// Run an episode on its own task so the poll cycle keeps going.
    ///
    /// Returns `None` if an episode for this service is already in flight.
    pub fn spawn_episode(
        self: &Arc<Self>,
        service: String,
        policy: RecoveryPolicy,
    ) -> Option<JoinHandle<Option<RecoveryOutcome>>> {
        if self.is_recovering(&service) {
            log::debug!("Restart of '{}' already in progress", service);
            return None;
        }

        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            controller.run_episode(&service, policy).await
        }))
    }
}

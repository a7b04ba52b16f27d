//! Alert dispatch with per-key rate limiting.
//!
//! Gated alerts (hardware overloads, restart reports) go through
//! [`AlertDispatcher::notify`]. A key with no delivery on record is always
//! delivered. Afterwards a key is held back until `frequency_minutes` have
//! passed since its last delivery, and even then a repeat inside a still
//! open episode is only delivered when repeats are allowed.
//!
//! An episode is open from the first alert for a key until the key is
//! resolved. How long apart the alerts are raised does not matter.
//!
//! Status transitions bypass all of this through [`AlertDispatcher::deliver_now`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::notifier::Notifier;
use crate::core::config::EmailSettings;

/// Identifies an alert class for rate limiting, e.g. `CPU Usage`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlertKey(String);

impl AlertKey {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastSentRecord {
    pub key: AlertKey,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// The transport failed; still counted as sent
    Failed,
    Suppressed,
}

impl DispatchOutcome {
    pub fn attempted(&self) -> bool {
        !matches!(self, DispatchOutcome::Suppressed)
    }
}

#[derive(Debug)]
struct KeyState {
    sent_at: Option<DateTime<Utc>>,
    open: bool,
}

pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    email: RwLock<EmailSettings>,
    keys: Mutex<HashMap<AlertKey, KeyState>>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, email: EmailSettings) -> Self {
        notifier.reconfigure(&email);
        Self {
            notifier,
            email: RwLock::new(email),
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Swap in new email settings; the notifier is reconfigured as well
    pub fn apply_settings(&self, email: &EmailSettings) {
        if *self.email.read() == *email {
            return;
        }
        self.notifier.reconfigure(email);
        *self.email.write() = email.clone();
    }

    pub fn email_settings(&self) -> EmailSettings {
        self.email.read().clone()
    }

    /// Prefix a subject with the configured subject tag
    pub fn full_subject(&self, subject: &str) -> String {
        let email = self.email.read();
        let prefix = email.subject.trim();
        if prefix.is_empty() {
            subject.to_string()
        } else {
            format!("[{}] {}", prefix, subject)
        }
    }

    pub async fn notify(
        &self,
        key: &AlertKey,
        subject: &str,
        body: &str,
        repeat_allowed: bool,
        frequency_minutes: u32,
    ) -> DispatchOutcome {
        self.notify_at(
            Utc::now(),
            key,
            subject,
            body,
            repeat_allowed,
            frequency_minutes,
        )
        .await
    }

    /// [`notify`](Self::notify) with an explicit clock
    pub async fn notify_at(
        &self,
        now: DateTime<Utc>,
        key: &AlertKey,
        subject: &str,
        body: &str,
        repeat_allowed: bool,
        frequency_minutes: u32,
    ) -> DispatchOutcome {
        if !self.admit(now, key, repeat_allowed, frequency_minutes) {
            log::debug!("Suppressed alert '{}'", key);
            return DispatchOutcome::Suppressed;
        }

        self.deliver_now(subject, body).await
    }

    /// Apply the rate limit and record the attempt in one step
    fn admit(
        &self,
        now: DateTime<Utc>,
        key: &AlertKey,
        repeat_allowed: bool,
        frequency_minutes: u32,
    ) -> bool {
        let window = Duration::minutes(i64::from(frequency_minutes));
        let mut keys = self.keys.lock();

        let deliver = match keys.get(key) {
            None => true,
            Some(KeyState { sent_at: None, .. }) => true,
            Some(state) => {
                let elapsed = state.sent_at.map(|at| now - at).unwrap_or(window);
                elapsed >= window && (repeat_allowed || !state.open)
            }
        };

        let state = keys.entry(key.clone()).or_insert(KeyState {
            sent_at: None,
            open: false,
        });
        state.open = true;
        if deliver {
            state.sent_at = Some(now);
        }

        deliver
    }

    /// Send without any rate limiting
    pub async fn deliver_now(&self, subject: &str, body: &str) -> DispatchOutcome {
        let subject = self.full_subject(subject);
        let recipients = self.email.read().to.clone();

        match self.notifier.send(&subject, body, &recipients).await {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e) => {
                log::error!("Failed to send email '{}': {}", subject, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// Close the open episode for a key; returns whether one was open
    pub fn resolve(&self, key: &AlertKey) -> bool {
        match self.keys.lock().get_mut(key) {
            Some(state) if state.open => {
                state.open = false;
                log::debug!("Resolved alert '{}'", key);
                true
            }
            _ => false,
        }
    }

    pub fn last_sent(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.keys.lock().get(key).and_then(|s| s.sent_at)
    }

    pub fn records(&self) -> Vec<LastSentRecord> {
        let mut records: Vec<_> = self
            .keys
            .lock()
            .iter()
            .filter_map(|(key, state)| {
                state.sent_at.map(|sent_at| LastSentRecord {
                    key: key.clone(),
                    sent_at,
                })
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

//! Notification dedup shared by the Slack and Mail middlewares.

pub mod mail;
pub mod slack;

use crate::execution::Execution;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Maps `(job name, error fingerprint) -> last-sent time`; entries older
/// than the cooldown are treated as absent.
pub struct NotificationDedup {
    last_sent: Mutex<HashMap<(String, String), DateTime<Utc>>>,
    cooldown: chrono::Duration,
}

impl NotificationDedup {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_sent: Mutex::new(HashMap::new()),
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::seconds(0)),
        }
    }

    /// Returns `true` (and records `now`) if a notification for this key
    /// should go out — either it's never been sent, or the cooldown has
    /// elapsed since the last send.
    fn should_send(&self, job_name: &str, fingerprint: &str) -> bool {
        let mut guard = self.last_sent.lock().unwrap();
        let key = (job_name.to_string(), fingerprint.to_string());
        let now = Utc::now();
        if let Some(last) = guard.get(&key) {
            if now.signed_duration_since(*last) < self.cooldown {
                return false;
            }
        }
        guard.insert(key, now);
        true
    }
}

/// Decides whether a notification middleware should fire at all, folding in
/// the only-on-error gate and the dedup cooldown. Kept free of any I/O so
/// it's trivially testable; `execution.failed == false` always notifies
/// (success notifications aren't deduplicated — there's no error to key on).
fn should_notify(execution: &Execution, only_on_error: bool, dedup: &NotificationDedup) -> Option<String> {
    if only_on_error && !execution.failed {
        return None;
    }
    if !execution.failed {
        return Some(format!("cronyx: job '{}' succeeded", execution.job_name));
    }
    let fingerprint = execution.error_fingerprint.as_deref().unwrap_or("unknown");
    if !dedup.should_send(&execution.job_name, fingerprint) {
        return None;
    }
    Some(format!(
        "cronyx: job '{}' failed: {}",
        execution.job_name,
        execution.error_message.as_deref().unwrap_or("unknown error")
    ))
}

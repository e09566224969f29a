//! A single firing of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One firing of a [`crate::job::Job`].
///
/// Created on fire, mutated during the run by the middleware chain and the
/// job body, and frozen once the chain returns. Serializable so the `save`
/// middleware can write it straight to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: u64,
    pub job_name: String,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub failed: bool,
    pub error_message: Option<String>,
    /// Error-kind fingerprint, set alongside `error_message`, used by the
    /// notification dedup middleware.
    pub error_fingerprint: Option<String>,
    pub skipped: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Execution {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            job_name: job_name.into(),
            started: Utc::now(),
            finished: None,
            failed: false,
            error_message: None,
            error_fingerprint: None,
            skipped: false,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn mark_skipped(&mut self) {
        self.skipped = true;
        self.finished = Some(Utc::now());
    }

    pub fn mark_success(&mut self) {
        self.failed = false;
        self.finished = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, kind: &str, message: impl Into<String>) {
        self.failed = true;
        let message = message.into();
        self.error_fingerprint = Some(fingerprint(kind, &message));
        self.error_message = Some(message);
        self.finished = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.finished.is_some()
    }
}

/// `{kind}:{first line of message, truncated to 80 chars}` — deliberately
/// coarser than the full message (which would include container IDs and
/// timestamps) but finer than the bare error kind.
pub fn fingerprint(kind: &str, message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    let truncated: String = first_line.chars().take(80).collect();
    format!("{kind}:{truncated}")
}

/// A bounded ring buffer of recent executions, kept per job.
#[derive(Debug, Default, Clone)]
pub struct History {
    capacity: usize,
    entries: std::collections::VecDeque<Execution>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: std::collections::VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, execution: Execution) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(execution);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Execution> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

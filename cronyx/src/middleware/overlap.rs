//! Overlap guard: refuses a second concurrent firing of a job whose
//! `no-overlap` flag is set.
//!
//! One instance is shared (via `Arc`) across every job's chain, so its
//! running-set is keyed by job name rather than one guard per job.

use super::Middleware;
use crate::execution::Execution;
use crate::job::Job;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct OverlapGuard {
    running: Mutex<HashSet<String>>,
}

impl OverlapGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.running.lock().unwrap().contains(job_name)
    }
}

#[async_trait]
impl Middleware for OverlapGuard {
    async fn before(&self, job: &Job, execution: &mut Execution) -> bool {
        if !job.no_overlap {
            return true;
        }
        let mut running = self.running.lock().unwrap();
        if !running.insert(job.name.clone()) {
            execution.mark_skipped();
            return false;
        }
        true
    }

    async fn after(&self, job: &Job, _execution: &mut Execution) {
        if job.no_overlap {
            self.running.lock().unwrap().remove(&job.name);
        }
    }
}

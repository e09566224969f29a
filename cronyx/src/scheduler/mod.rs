//! Owns the registered jobs and drives each one on its own cancellable
//! task. `cronyx_cron::Cron::run` holds `&mut self` for its entire
//! lifetime, which rules out the reconciler's concurrent add/remove
//! calls — so instead of one shared `Cron`, every job gets its own
//! sleep/fire loop (mirroring the one-task-per-job pattern `bollard`-based
//! supervisors use to track a single container), bridged into
//! `cronyx_cron`'s `on_start`/`on_complete`/`on_error` lifecycle via
//! [`entry::SchedulerEntry`] and `JobItem`.

mod entry;

pub use entry::{SchedulerEntry, HISTORY_CAPACITY};

use crate::error::SchedulerError;
use crate::execution::History;
use crate::job::Job;
use crate::middleware::Middleware;
use cronyx_cron::JobItem;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Registered {
    job: Arc<Job>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The live scheduler: one cancellable task per enabled job.
pub struct Scheduler {
    jobs: Mutex<HashMap<String, Registered>>,
    disabled: Mutex<HashMap<String, Arc<Job>>>,
    middlewares: Mutex<Vec<Arc<dyn Middleware>>>,
    running: Arc<std::sync::Mutex<HashSet<u64>>>,
    histories: Arc<std::sync::Mutex<HashMap<String, History>>>,
    /// Gates every job's `fire_loop`: a job added while this is `false` is
    /// parked (its task is spawned but sleeps on this channel) until
    /// `start()` flips it.
    started: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            disabled: Mutex::new(HashMap::new()),
            middlewares: Mutex::new(Vec::new()),
            running: Arc::new(std::sync::Mutex::new(HashSet::new())),
            histories: Arc::new(std::sync::Mutex::new(HashMap::new())),
            started: watch::channel(false).0,
        }
    }

    /// Appends to the global middleware chain. Applies to jobs registered
    /// after this call; does not rewire jobs already running.
    pub async fn r#use(&self, middleware: Arc<dyn Middleware>) {
        self.middlewares.lock().await.push(middleware);
    }

    /// Replaces the global middleware chain atomically.
    pub async fn reset_middlewares(&self, middlewares: Vec<Arc<dyn Middleware>>) {
        *self.middlewares.lock().await = middlewares;
    }

    /// Registers a job. If the scheduler is running, it starts firing
    /// immediately; otherwise its task is spawned but parked until
    /// `start()` is called. The job's own middleware list is prefixed with
    /// the scheduler's current global chain (global middlewares wrap the
    /// per-job ones, per the composed-chain firing order).
    pub async fn add_job(&self, mut job: Job) -> Result<(), SchedulerError> {
        let name = job.name.clone();
        if self.jobs.lock().await.contains_key(&name) || self.disabled.lock().await.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob { name });
        }

        let mut combined = self.middlewares.lock().await.clone();
        combined.extend(job.middlewares.drain(..));
        job.middlewares = combined;

        let job = Arc::new(job);
        let registered = self.spawn(job.clone());
        self.jobs.lock().await.insert(name, registered);
        Ok(())
    }

    /// Cancels the job's task immediately. Does not wait for an in-flight
    /// execution; it is detached and left to finish on its own.
    pub async fn remove_job(&self, name: &str) -> Result<(), SchedulerError> {
        if let Some(registered) = self.jobs.lock().await.remove(name) {
            registered.cancel.cancel();
            return Ok(());
        }
        if self.disabled.lock().await.remove(name).is_some() {
            return Ok(());
        }
        Err(SchedulerError::UnknownJob { name: name.to_string() })
    }

    /// Moves a job out of the firing set and into `disabled`, without
    /// forgetting its definition. In-flight executions continue.
    pub async fn disable_job(&self, name: &str) -> Result<(), SchedulerError> {
        let registered = self
            .jobs
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| SchedulerError::UnknownJob { name: name.to_string() })?;
        registered.cancel.cancel();
        self.disabled.lock().await.insert(name.to_string(), registered.job);
        Ok(())
    }

    /// Inverse of `disable_job`: resumes firing.
    pub async fn enable_job(&self, name: &str) -> Result<(), SchedulerError> {
        let job = self
            .disabled
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| SchedulerError::UnknownJob { name: name.to_string() })?;
        let registered = self.spawn(job);
        self.jobs.lock().await.insert(name.to_string(), registered);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.started.borrow()
    }

    pub async fn jobs(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    pub async fn disabled(&self) -> Vec<String> {
        self.disabled.lock().await.keys().cloned().collect()
    }

    pub fn running(&self) -> HashSet<u64> {
        self.running.lock().unwrap().clone()
    }

    pub fn history(&self, job_name: &str) -> Vec<crate::execution::Execution> {
        self.histories
            .lock()
            .unwrap()
            .get(job_name)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seeds in-memory history from previously-saved executions (see
    /// `middleware::SaveMiddleware::restore`), bounded by `max_age`.
    pub fn seed_history(&self, executions: Vec<crate::execution::Execution>, max_age: chrono::Duration) {
        let cutoff = chrono::Utc::now() - max_age;
        let mut histories = self.histories.lock().unwrap();
        for execution in executions {
            if execution.started < cutoff {
                continue;
            }
            histories
                .entry(execution.job_name.clone())
                .or_insert_with(|| History::new(HISTORY_CAPACITY))
                .push(execution);
        }
    }

    /// Marks the scheduler running and releases every job parked since
    /// being added while stopped. Idempotent.
    pub fn start(&self) {
        let _ = self.started.send(true);
        info!("scheduler started");
    }

    /// Cancels every job task and waits up to `timeout` for them to finish.
    /// Tasks still running past the deadline are detached, not killed.
    pub async fn stop(&self, timeout: Duration) {
        let _ = self.started.send(false);
        let registered: Vec<Registered> = self.jobs.lock().await.drain().map(|(_, r)| r).collect();
        for r in &registered {
            r.cancel.cancel();
        }
        let wait = async {
            for r in registered {
                let _ = r.handle.await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!("scheduler stop timed out; some executions were left detached");
        }
        info!("scheduler stopped");
    }

    fn spawn(&self, job: Arc<Job>) -> Registered {
        let cancel = CancellationToken::new();
        let entry = Arc::new(SchedulerEntry {
            job: job.clone(),
            running: self.running.clone(),
            histories: self.histories.clone(),
        });
        let item = JobItem::new(entry).expect("schedule was validated at registration");
        let task_cancel = cancel.clone();
        let started = self.started.subscribe();
        let handle = tokio::spawn(async move { fire_loop(item, task_cancel, started).await });
        Registered { job, cancel, handle }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocks until the scheduler is started, or returns `false` if the
/// started channel is gone (the scheduler was dropped).
async fn wait_for_start(started: &mut watch::Receiver<bool>) -> bool {
    while !*started.borrow() {
        if started.changed().await.is_err() {
            return false;
        }
    }
    true
}

/// The per-job loop: park until the scheduler starts, sleep until the
/// next occurrence, fire, repeat — until cancelled or the schedule has no
/// further occurrences.
async fn fire_loop(item: JobItem, cancel: CancellationToken, mut started: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            ok = wait_for_start(&mut started) => {
                if !ok {
                    return;
                }
            }
        }

        let Some(next_run) = item.next_run_time() else {
            warn!(job = %item.name(), "schedule produced no further occurrences, stopping");
            return;
        };
        let now = chrono::Utc::now();
        let delay = (next_run - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let name = item.name().to_string();
        let run = item.run();
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = run => {
                if let Err(err) = result {
                    warn!(job = %name, error = ?err, "job fire returned an error");
                }
            }
        }
    }
}

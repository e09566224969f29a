use crate::CronResult;
use crate::contracts::JobContract;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::sync::Arc;

/// An internal wrapper around a `JobContract` that exposes the helper
/// methods used by the scheduler.
///
/// Constructed once per registered job via [`JobItem::new`]; the schedule
/// was already validated when the job was built, so construction here
/// never fails.
#[derive(Clone)]
pub struct JobItem {
    job: Arc<dyn JobContract>,
}

impl JobItem {
    pub fn new(job: Arc<dyn JobContract>) -> CronResult<Self> {
        Ok(JobItem { job })
    }

    #[allow(dead_code)]
    pub fn id(&self) -> Cow<'_, str> {
        self.job.id()
    }

    pub fn name(&self) -> Cow<'_, str> {
        self.job.name()
    }

    /// Computes the next scheduled execution time from now.
    pub fn next_run_time(&self) -> Option<DateTime<Utc>> {
        self.job.schedule().upcoming()
    }

    /// Runs the lifecycle sequence: `on_start` → `run` → `on_complete` / `on_error`.
    pub async fn run(&self) -> CronResult<()> {
        self.job.on_start().await;
        match self.job.run().await {
            Ok(()) => {
                self.job.on_complete().await;
                Ok(())
            }
            Err(err) => {
                self.job.on_error(&err).await;
                Err(err)
            }
        }
    }
}

use crate::CronResult;
use crate::schedule::ValidatedSchedule;
use std::borrow::Cow;

/// A trait representing a schedulable job for the Cron system.
///
/// Any struct or closure that implements this trait can be scheduled
/// and executed according to its provided cron schedule.
///
/// ## Required Methods
/// - `run`: The asynchronous execution logic of the job.
/// - `id`: A stable identifier used for dedup and logging.
/// - `name`: A human-readable name for identification and logging.
/// - `schedule`: The validated schedule describing when the job should run.
///
/// ## Optional Methods
/// - `description`: An optional human-friendly description of the job.
/// - `on_start` / `on_complete` / `on_error`: lifecycle hooks invoked by
///   [`JobItem::run`](crate::JobItem::run) around the job body.
#[async_trait::async_trait]
pub trait JobContract: Send + Sync {
    /// The asynchronous logic that should be run when the job is triggered.
    async fn run(&self) -> CronResult<()>;

    /// A stable unique identifier for the job.
    fn id(&self) -> Cow<'_, str>;

    /// A human-readable name used in logs and debugging output.
    fn name(&self) -> Cow<'_, str>;

    /// The schedule describing when the job should fire.
    fn schedule(&self) -> &ValidatedSchedule;

    /// A brief optional description of the job. Defaults to `None`.
    fn description(&self) -> Option<String> {
        None
    }

    /// Called immediately before `run`.
    async fn on_start(&self) {}

    /// Called after `run` returns `Ok(())`.
    async fn on_complete(&self) {}

    /// Called after `run` returns `Err`.
    async fn on_error(&self, _error: &anyhow::Error) {}
}

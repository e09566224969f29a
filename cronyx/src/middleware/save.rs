//! Save middleware: persists each execution to a per-job directory so the
//! supervisor can restore recent history after a restart.
//!
//! File names are deterministic (`{execution-id}.json`) so a restart that
//! replays the same directory overwrites rather than accumulates.

use super::Middleware;
use crate::execution::Execution;
use crate::job::Job;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct SaveMiddleware {
    directory: PathBuf,
    only_on_error: bool,
}

impl SaveMiddleware {
    pub fn new(directory: impl Into<PathBuf>, only_on_error: bool) -> Self {
        Self {
            directory: directory.into(),
            only_on_error,
        }
    }

    fn path_for(&self, execution: &Execution) -> PathBuf {
        self.directory.join(format!("{}.json", execution.id))
    }

    /// Reads back every saved execution in `directory`, most recent first,
    /// used to seed in-memory history on startup. Malformed files are
    /// skipped with a warning rather than aborting the restore.
    pub fn restore(directory: &Path) -> Vec<Execution> {
        let Ok(entries) = std::fs::read_dir(directory) else {
            return Vec::new();
        };
        let mut executions: Vec<Execution> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| match std::fs::read_to_string(entry.path()) {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(execution) => Some(execution),
                    Err(error) => {
                        warn!(path = %entry.path().display(), %error, "failed to parse saved execution");
                        None
                    }
                },
                Err(error) => {
                    warn!(path = %entry.path().display(), %error, "failed to read saved execution");
                    None
                }
            })
            .collect();
        executions.sort_by_key(|e| e.started);
        executions.reverse();
        executions
    }
}

#[async_trait]
impl Middleware for SaveMiddleware {
    async fn after(&self, job: &Job, execution: &mut Execution) {
        if self.only_on_error && !execution.failed {
            return;
        }
        if let Err(error) = std::fs::create_dir_all(&self.directory) {
            warn!(job = %job.name, %error, "failed to create save directory");
            return;
        }
        let contents = match serde_json::to_string_pretty(execution) {
            Ok(contents) => contents,
            Err(error) => {
                warn!(job = %job.name, %error, "failed to serialize execution for saving");
                return;
            }
        };
        if let Err(error) = std::fs::write(self.path_for(execution), contents) {
            warn!(job = %job.name, %error, "failed to write saved execution");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ExecJob, JobSpec, Source, UserSetting};
    use crate::runtime::fake::FakeRuntime;
    use cronyx_cron::ValidatedSchedule;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_job() -> Job {
        Job {
            name: "save-job".to_string(),
            schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
            user: UserSetting::Inherit,
            source: Source::Ini,
            no_overlap: false,
            spec: JobSpec::Exec(ExecJob {
                container: "web".to_string(),
                command: vec!["true".to_string()],
            }),
            notify_fingerprint: String::new(),
            middlewares: vec![],
            runtime: Arc::new(FakeRuntime::new()),
        }
    }

    #[tokio::test]
    async fn saved_execution_round_trips_through_restore() {
        let dir = tempdir().unwrap();
        let mw = SaveMiddleware::new(dir.path(), false);
        let job = test_job();
        let mut execution = Execution::new(&job.name);
        execution.mark_success();
        mw.after(&job, &mut execution).await;

        let restored = SaveMiddleware::restore(dir.path());
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].job_name, "save-job");
    }

    #[tokio::test]
    async fn only_on_error_skips_successful_executions() {
        let dir = tempdir().unwrap();
        let mw = SaveMiddleware::new(dir.path(), true);
        let job = test_job();
        let mut execution = Execution::new(&job.name);
        execution.mark_success();
        mw.after(&job, &mut execution).await;

        assert!(SaveMiddleware::restore(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn restore_from_missing_directory_returns_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(SaveMiddleware::restore(&missing).is_empty());
    }
}

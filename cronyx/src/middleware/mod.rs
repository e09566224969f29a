//! The middleware pipeline: an ordered chain wrapping every job firing.
//!
//! Represented as `before`/`after` hooks rather than a literal
//! `func(next) func(exec)` chain — composition still matches the spec's
//! right-fold, last-registered-is-outermost rule: `before` runs in reverse
//! registration order (outermost first), `after` runs in registration order
//! (innermost first, mirroring how a wrapped call unwinds).

pub mod notify;
mod overlap;
mod save;

pub use notify::{mail::MailNotifier, slack::SlackNotifier, NotificationDedup};
pub use overlap::OverlapGuard;
pub use save::SaveMiddleware;

use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::job::Job;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before the job body. Returning `false` skips the body — every
    /// middleware's `after` still runs, including this one's.
    async fn before(&self, _job: &Job, _execution: &mut Execution) -> bool {
        true
    }

    /// Runs after the job body ran (or was skipped by an earlier `before`).
    async fn after(&self, _job: &Job, _execution: &mut Execution) {}
}

/// A built middleware chain for one job. Built once per job (re)build, not
/// once per fire — `Job::fire` just clones the cheap `Arc` list each time.
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    pub async fn run(&self, job: &Job, execution: &mut Execution) -> Result<(), SchedulerError> {
        let mut proceed = true;
        for mw in self.middlewares.iter().rev() {
            if !mw.before(job, execution).await {
                proceed = false;
                break;
            }
        }

        let result = if proceed {
            job.execute(execution).await
        } else {
            execution.mark_skipped();
            Ok(())
        };

        for mw in self.middlewares.iter() {
            mw.after(job, execution).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ExecJob, JobSpec, Source, UserSetting};
    use crate::runtime::fake::FakeRuntime;
    use cronyx_cron::ValidatedSchedule;

    struct Recorder {
        label: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn before(&self, _job: &Job, _execution: &mut Execution) -> bool {
            self.log.lock().unwrap().push(self.label);
            true
        }

        async fn after(&self, _job: &Job, _execution: &mut Execution) {
            self.log.lock().unwrap().push(self.label);
        }
    }

    struct Denier;

    #[async_trait]
    impl Middleware for Denier {
        async fn before(&self, _job: &Job, execution: &mut Execution) -> bool {
            execution.mark_skipped();
            false
        }
    }

    fn test_job(middlewares: Vec<Arc<dyn Middleware>>) -> Job {
        Job {
            name: "chain-job".to_string(),
            schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
            user: UserSetting::Inherit,
            source: Source::Ini,
            no_overlap: false,
            spec: JobSpec::Exec(ExecJob {
                container: "web".to_string(),
                command: vec!["true".to_string()],
            }),
            notify_fingerprint: String::new(),
            middlewares,
            runtime: Arc::new(FakeRuntime::new().with_container(
                crate::runtime::ContainerSummary {
                    id: "c1".into(),
                    name: "web".into(),
                    running: true,
                    labels: Default::default(),
                },
            )),
        }
    }

    #[tokio::test]
    async fn last_registered_runs_outermost() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a: Arc<dyn Middleware> = Arc::new(Recorder { label: "a", log: log.clone() });
        let b: Arc<dyn Middleware> = Arc::new(Recorder { label: "b", log: log.clone() });
        let job = test_job(vec![a, b]);
        let chain = Chain::new(job.middlewares.clone());
        let mut execution = Execution::new(&job.name);
        chain.run(&job, &mut execution).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b", "a", "a", "b"]);
    }

    #[tokio::test]
    async fn a_denying_middleware_skips_the_body_but_every_after_still_runs() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let denier: Arc<dyn Middleware> = Arc::new(Denier);
        let recorder: Arc<dyn Middleware> = Arc::new(Recorder { label: "r", log: log.clone() });
        let job = test_job(vec![recorder, denier]);
        let chain = Chain::new(job.middlewares.clone());
        let mut execution = Execution::new(&job.name);
        chain.run(&job, &mut execution).await.unwrap();
        assert!(execution.skipped);
        assert_eq!(*log.lock().unwrap(), vec!["r"]);
    }

    #[tokio::test]
    async fn empty_chain_runs_the_body_directly() {
        let job = test_job(vec![]);
        let chain = Chain::new(job.middlewares.clone());
        let mut execution = Execution::new(&job.name);
        chain.run(&job, &mut execution).await.unwrap();
        assert!(!execution.failed);
        assert!(!execution.skipped);
    }
}

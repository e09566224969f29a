//! Adapts a [`Job`] + its middleware chain into `cronyx_cron`'s
//! [`JobContract`], so a single firing reuses the engine's
//! on_start/on_complete/on_error lifecycle instead of reimplementing it.

use crate::execution::{Execution, History};
use crate::job::Job;
use crate::middleware::Chain;
use async_trait::async_trait;
use cronyx_cron::contracts::JobContract;
use cronyx_cron::{CronResult, ValidatedSchedule};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Bounded per-job history depth kept in memory.
pub const HISTORY_CAPACITY: usize = 50;

pub struct SchedulerEntry {
    pub job: Arc<Job>,
    pub running: Arc<Mutex<HashSet<u64>>>,
    pub histories: Arc<Mutex<HashMap<String, History>>>,
}

#[async_trait]
impl JobContract for SchedulerEntry {
    async fn run(&self) -> CronResult<()> {
        let mut execution = Execution::new(self.job.name.clone());
        self.running.lock().unwrap().insert(execution.id);

        let chain = Chain::new(self.job.middlewares.clone());
        let result = chain.run(&self.job, &mut execution).await;

        self.running.lock().unwrap().remove(&execution.id);
        self.histories
            .lock()
            .unwrap()
            .entry(self.job.name.clone())
            .or_insert_with(|| History::new(HISTORY_CAPACITY))
            .push(execution);

        result.map_err(anyhow::Error::from)
    }

    fn id(&self) -> Cow<'_, str> {
        Cow::Owned(self.job.name.clone())
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.job.name)
    }

    fn schedule(&self) -> &ValidatedSchedule {
        &self.job.schedule
    }

    fn description(&self) -> Option<String> {
        Some(format!("{} job '{}'", self.job.spec.kind_name(), self.job.name))
    }

    async fn on_start(&self) {
        info!(job = %self.job.name, kind = self.job.spec.kind_name(), "job fire starting");
    }

    async fn on_error(&self, error: &anyhow::Error) {
        warn!(job = %self.job.name, %error, "job fire failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ExecJob, JobSpec, Source, UserSetting};
    use crate::runtime::fake::FakeRuntime;
    use crate::runtime::ContainerSummary;

    fn make_entry() -> SchedulerEntry {
        let job = Arc::new(Job {
            name: "entry-job".to_string(),
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
            runtime: Arc::new(FakeRuntime::new().with_container(ContainerSummary {
                id: "c1".into(),
                name: "web".into(),
                running: true,
                labels: Default::default(),
            })),
        });
        SchedulerEntry {
            job,
            running: Arc::new(Mutex::new(HashSet::new())),
            histories: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[tokio::test]
    async fn a_run_records_history_and_clears_running_set() {
        let entry = make_entry();
        entry.run().await.unwrap();
        assert!(entry.running.lock().unwrap().is_empty());
        let histories = entry.histories.lock().unwrap();
        assert_eq!(histories.get("entry-job").unwrap().len(), 1);
    }
}

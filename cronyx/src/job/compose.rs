//! Compose kind: invoke the `docker compose` CLI for a given project file.
//!
//! Treated as a host process for exit-classification purposes (see
//! `job::local`) — there is no Engine API equivalent for compose's own
//! orchestration, so this shells out rather than going through
//! `ContainerRuntime`.

use super::{ComposeJob, Job};
use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::job::local;

pub async fn run(
    job: &Job,
    spec: &ComposeJob,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let mut command = vec!["docker".to_string(), "compose".to_string(), "-f".to_string(), spec.file.clone()];
    command.push("run".to_string());
    command.push("--rm".to_string());
    if let Some(service) = &spec.service {
        command.push(service.clone());
    }
    command.extend(spec.command.iter().cloned());

    local::run_command(job, &command, None, &[], execution).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, Source, UserSetting};
    use crate::runtime::fake::FakeRuntime;
    use cronyx_cron::ValidatedSchedule;
    use std::sync::Arc;

    fn make_compose_job(file: &str, service: Option<&str>) -> (Job, ComposeJob) {
        let spec = ComposeJob {
            file: file.to_string(),
            service: service.map(String::from),
            command: vec![],
        };
        let job = Job {
            name: "compose-job".to_string(),
            schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
            user: UserSetting::Inherit,
            source: Source::Ini,
            no_overlap: false,
            spec: JobSpec::Compose(spec.clone()),
            notify_fingerprint: String::new(),
            middlewares: vec![],
            runtime: Arc::new(FakeRuntime::new()),
        };
        (job, spec)
    }

    #[tokio::test]
    async fn missing_compose_binary_surfaces_as_runtime_preparation_error() {
        // `docker` is unlikely to exist in the sandboxed test environment,
        // so this exercises the spawn-failure path rather than a real run.
        let (job, spec) = make_compose_job("docker-compose.yml", Some("web"));
        let mut execution = Execution::new(&job.name);
        let result = run(&job, &spec, &mut execution).await;
        assert!(result.is_err());
    }
}

//! Exec kind: run a command inside an already-running container.
//!
//! States: `Idle -> CreatingExec -> Running -> Finished`. No resource
//! cleanup — the target container is owned by whoever started it, not by
//! this job.

use super::{ExecJob, Job};
use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::runtime::{CreateExecSpec, LogChannel};

pub async fn run(
    job: &Job,
    spec: &ExecJob,
    user: Option<&str>,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let runtime = &job.runtime;

    let container = runtime.inspect_container(&spec.container).await.map_err(|e| {
        SchedulerError::runtime_preparation(
            &job.name,
            format!("container '{}' not found", spec.container),
            e,
        )
    })?;

    if !container.running {
        let message = format!("container '{}' is not running", spec.container);
        execution.mark_failed("runtime-preparation", &message);
        return Err(SchedulerError::runtime_preparation(
            &job.name,
            message.clone(),
            anyhow::anyhow!(message),
        ));
    }

    let exec_id = runtime
        .create_exec(
            &container.id,
            CreateExecSpec {
                cmd: spec.command.clone(),
                user: user.map(str::to_string),
                tty: false,
                env: Vec::new(),
            },
        )
        .await
        .map_err(|e| SchedulerError::runtime_preparation(&job.name, "create exec failed", e))?;

    let exit_code = {
        let stdout = &mut execution.stdout;
        let stderr = &mut execution.stderr;
        let mut on_output = |channel: LogChannel, line: &str| match channel {
            LogChannel::Stdout => stdout.push_str(line),
            LogChannel::Stderr => stderr.push_str(line),
        };

        runtime
            .start_exec(&exec_id, &mut on_output)
            .await
            .map_err(|e| SchedulerError::runtime_execution(&job.name, "exec stream failed", e))?
    };

    if exit_code != 0 {
        let message = format!("exec exited with status {exit_code}");
        execution.mark_failed("runtime-execution", &message);
        return Err(SchedulerError::runtime_execution(
            &job.name,
            message.clone(),
            anyhow::anyhow!(message),
        ));
    }

    execution.mark_success();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, Source, UserSetting};
    use crate::runtime::{ContainerSummary, fake::FakeRuntime};
    use cronyx_cron::ValidatedSchedule;
    use std::sync::Arc;

    fn job_with(runtime: Arc<FakeRuntime>, container: &str) -> Job {
        Job {
            name: "exec-job".to_string(),
            schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
            user: UserSetting::Inherit,
            source: Source::Ini,
            no_overlap: false,
            spec: JobSpec::Exec(ExecJob {
                container: container.to_string(),
                command: vec!["echo".to_string(), "hi".to_string()],
            }),
            notify_fingerprint: String::new(),
            middlewares: vec![],
            runtime,
        }
    }

    #[tokio::test]
    async fn succeeds_when_exit_code_is_zero() {
        let runtime = Arc::new(
            FakeRuntime::new().with_container(ContainerSummary {
                id: "c1".to_string(),
                name: "web".to_string(),
                running: true,
                labels: Default::default(),
            }),
        );
        runtime.set_exec_exit_code(0);
        let job = job_with(runtime, "web");
        let ExecJob { container, command } = match &job.spec {
            JobSpec::Exec(e) => e.clone(),
            _ => unreachable!(),
        };
        let spec = ExecJob { container, command };
        let mut execution = Execution::new(&job.name);
        run(&job, &spec, None, &mut execution).await.unwrap();
        assert!(!execution.failed);
    }

    #[tokio::test]
    async fn fails_when_the_container_is_not_running() {
        let runtime = Arc::new(
            FakeRuntime::new().with_container(ContainerSummary {
                id: "c1".to_string(),
                name: "web".to_string(),
                running: false,
                labels: Default::default(),
            }),
        );
        let job = job_with(runtime, "web");
        let spec = match &job.spec {
            JobSpec::Exec(e) => e.clone(),
            _ => unreachable!(),
        };
        let mut execution = Execution::new(&job.name);
        let result = run(&job, &spec, None, &mut execution).await;
        assert!(result.is_err());
        assert!(execution.failed);
    }

    #[tokio::test]
    async fn fails_on_nonzero_exit_code() {
        let runtime = Arc::new(
            FakeRuntime::new().with_container(ContainerSummary {
                id: "c1".to_string(),
                name: "web".to_string(),
                running: true,
                labels: Default::default(),
            }),
        );
        runtime.set_exec_exit_code(1);
        let job = job_with(runtime, "web");
        let spec = match &job.spec {
            JobSpec::Exec(e) => e.clone(),
            _ => unreachable!(),
        };
        let mut execution = Execution::new(&job.name);
        let result = run(&job, &spec, None, &mut execution).await;
        assert!(result.is_err());
        assert!(execution.failed);
    }
}

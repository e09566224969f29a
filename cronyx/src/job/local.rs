//! Local kind: run a command directly on the host, outside any container.
//!
//! Only reachable from INI-defined jobs (see `JobSpec::is_host_impacting`);
//! the label watcher never produces one. No runtime dependency at all —
//! this is the one kind that does not touch `ContainerRuntime`.

use super::{Job, LocalJob};
use crate::error::SchedulerError;
use crate::execution::Execution;
use std::process::Stdio;
use tokio::process::Command;

pub async fn run(
    job: &Job,
    spec: &LocalJob,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    run_command(job, &spec.command, spec.dir.as_deref(), &spec.env, execution).await
}

pub(super) async fn run_command(
    job: &Job,
    command: &[String],
    dir: Option<&str>,
    env: &[String],
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let Some((program, args)) = command.split_first() else {
        return Err(SchedulerError::configuration(format!(
            "job '{}' has an empty command",
            job.name
        )));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for entry in env {
        if let Some((key, value)) = entry.split_once('=') {
            cmd.env(key, value);
        }
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| SchedulerError::runtime_preparation(&job.name, "spawn failed", anyhow::Error::from(e)))?;

    execution.stdout.push_str(&String::from_utf8_lossy(&output.stdout));
    execution.stderr.push_str(&String::from_utf8_lossy(&output.stderr));

    match output.status.code() {
        Some(0) => {
            execution.mark_success();
            Ok(())
        }
        code => {
            let message = match code {
                Some(code) => format!("process exited with status {code}"),
                None => "process terminated by signal".to_string(),
            };
            execution.mark_failed("runtime-execution", &message);
            Err(SchedulerError::runtime_execution(
                &job.name,
                message.clone(),
                anyhow::anyhow!(message),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, Source, UserSetting};
    use crate::runtime::fake::FakeRuntime;
    use cronyx_cron::ValidatedSchedule;
    use std::sync::Arc;

    fn make_local_job(command: Vec<&str>) -> (Job, LocalJob) {
        let spec = LocalJob {
            command: command.into_iter().map(String::from).collect(),
            dir: None,
            env: vec![],
        };
        let job = Job {
            name: "local-job".to_string(),
            schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
            user: UserSetting::Inherit,
            source: Source::Ini,
            no_overlap: false,
            spec: JobSpec::Local(spec.clone()),
            notify_fingerprint: String::new(),
            middlewares: vec![],
            runtime: Arc::new(FakeRuntime::new()),
        };
        (job, spec)
    }

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let (job, spec) = make_local_job(vec!["echo", "hello"]);
        let mut execution = Execution::new(&job.name);
        run(&job, &spec, &mut execution).await.unwrap();
        assert!(!execution.failed);
        assert!(execution.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_marks_execution_failed() {
        let (job, spec) = make_local_job(vec!["false"]);
        let mut execution = Execution::new(&job.name);
        let result = run(&job, &spec, &mut execution).await;
        assert!(result.is_err());
        assert!(execution.failed);
    }

    #[tokio::test]
    async fn empty_command_is_a_configuration_error() {
        let (job, spec) = make_local_job(vec![]);
        let mut execution = Execution::new(&job.name);
        let result = run(&job, &spec, &mut execution).await;
        assert!(matches!(result, Err(SchedulerError::Configuration { .. })));
    }
}

//! Run kind: create a fresh container, run it to completion, clean up.
//!
//! States: `Idle -> EnsuringImage -> Creating -> Starting -> Waiting ->
//! Cleaning -> Finished`. Cleanup runs on every exit path, including
//! mid-create failures, when `delete` is set (the default).

use super::{Job, PullPolicy, RunJob};
use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::runtime::CreateContainerSpec;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

const STOP_GRACE: Duration = Duration::from_secs(5);

pub async fn run(
    job: &Job,
    spec: &RunJob,
    user: Option<&str>,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let runtime = &job.runtime;

    let needs_pull = match spec.pull {
        PullPolicy::Always => true,
        PullPolicy::IfMissing => !runtime.has_image_local(&spec.image).await.map_err(|e| {
            SchedulerError::runtime_preparation(&job.name, "checking local image", e)
        })?,
    };
    if needs_pull {
        runtime
            .pull_image(&spec.image)
            .await
            .map_err(|e| SchedulerError::runtime_preparation(&job.name, "image pull failed", e))?;
    }

    let container_id = runtime
        .create_container(CreateContainerSpec {
            name: spec.container.clone(),
            image: spec.image.clone(),
            cmd: spec.command.clone(),
            user: user.map(str::to_string),
            working_dir: spec.working_dir.clone(),
            entrypoint: spec.entrypoint.clone(),
            env: spec.env.clone(),
            volumes: spec.volumes.clone(),
            network: spec.network.first().cloned(),
        })
        .await
        .map_err(|e| SchedulerError::runtime_preparation(&job.name, "container create failed", e))?;

    for network in spec.network.iter().skip(1) {
        if let Err(e) = runtime.connect_network(&container_id, network).await {
            warn!(job = %job.name, network = %network, error = ?e, "failed to connect extra network");
        }
    }

    let result = run_and_wait(job, spec, &container_id, execution).await;

    if spec.delete {
        if let Err(e) = runtime.remove_container(&container_id).await {
            warn!(job = %job.name, container = %container_id, error = ?e, "failed to remove container after run");
        }
    }

    result
}

async fn run_and_wait(
    job: &Job,
    spec: &RunJob,
    container_id: &str,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let runtime = &job.runtime;

    runtime.start_container(container_id).await.map_err(|e| {
        SchedulerError::runtime_preparation(&job.name, "container start failed", e)
    })?;

    let wait = runtime.wait_container(container_id);

    let exit_code = match spec.max_runtime {
        Some(limit) => match timeout(limit, wait).await {
            Ok(result) => result
                .map_err(|e| SchedulerError::runtime_execution(&job.name, "wait failed", e))?,
            Err(_) => {
                let _ = runtime.stop_container(container_id, STOP_GRACE).await;
                execution.mark_failed(
                    "timeout",
                    format!("exceeded max runtime of {limit:?}"),
                );
                return Err(SchedulerError::timeout(&job.name, limit));
            }
        },
        None => wait
            .await
            .map_err(|e| SchedulerError::runtime_execution(&job.name, "wait failed", e))?,
    };

    if exit_code != 0 {
        let message = format!("container exited with status {exit_code}");
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
